//! Program loading: spawn and exec
//!
//! Spawn reads an executable from the filesystem, builds a fresh
//! process around it and queues it; exec replaces the current
//! process's user image in place, keeping its pid, parent link,
//! descriptors and kernel stack. Both map each `PT_LOAD` segment as
//! writable user pages, copy the file bytes through the sanctioned
//! user-copy path and rely on freshly allocated frames being zeroed
//! for the `memsz` tail.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::elf::{self, ElfImage};
use crate::error::KernelResult;
use crate::kernel::Kernel;
use crate::mm::{
    AddressSpace, PageFlags, VirtAddr, PAGE_SIZE, USER_STACK_SIZE, USER_STACK_TOP,
};
use crate::process::{Pid, ProcessState};
use crate::trap::TrapFrame;

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(path)
}

impl Kernel {
    /// Map an image's segments and a fresh user stack into `space`.
    fn load_image(&mut self, space: AddressSpace, image: &ElfImage, file: &[u8]) -> KernelResult<()> {
        let Kernel {
            ref phys,
            ref mut frames,
            ..
        } = *self;
        let page = PAGE_SIZE as u32;

        for seg in &image.segments {
            let start = seg.vaddr & !(page - 1);
            let end = (seg.vaddr + seg.memsz).div_ceil(page) * page;
            let mut virt = start;
            while virt < end {
                if space.translate(phys, VirtAddr::new(virt)).is_none() {
                    space.map_alloc(
                        phys,
                        frames,
                        VirtAddr::new(virt),
                        PageFlags::WRITABLE | PageFlags::USER,
                    )?;
                }
                virt += page;
            }
            if seg.filesz > 0 {
                let bytes = &file[seg.offset as usize..(seg.offset + seg.filesz) as usize];
                space.copy_to_user(phys, frames, seg.vaddr, bytes)?;
            }
            // memsz tail: map_alloc frames start zeroed.
        }

        let stack_bottom = USER_STACK_TOP - USER_STACK_SIZE;
        let mut virt = stack_bottom;
        while virt < USER_STACK_TOP {
            if space.translate(phys, VirtAddr::new(virt)).is_none() {
                space.map_alloc(
                    phys,
                    frames,
                    VirtAddr::new(virt),
                    PageFlags::WRITABLE | PageFlags::USER,
                )?;
            }
            virt += page;
        }
        Ok(())
    }

    /// Read and validate an executable, resolving `path` against the
    /// caller's cwd.
    fn read_executable(&self, path: &str) -> KernelResult<(Vec<u8>, ElfImage)> {
        let cwd = self
            .pm
            .current()
            .map(|p| p.cwd.clone())
            .unwrap_or_else(|| self.pm.default_cwd.clone());
        let data = self.fs.read_file(path, &cwd)?;
        let image = elf::parse(&data)?;
        Ok((data, image))
    }

    /// Spawn a new process from a filesystem executable. The child is
    /// Ready; the caller (if any) keeps running.
    pub fn spawn(&mut self, path: &str, args: &[u8]) -> KernelResult<Pid> {
        let (data, image) = self.read_executable(path)?;

        let parent = self.pm.current_pid();
        let pid = self.create_process(base_name(path), parent)?;

        let space = self.pm.get(pid).unwrap().space;
        if let Err(e) = self.load_image(space, &image, &data) {
            self.discard_stillborn(pid);
            return Err(e);
        }

        {
            let heap_base = image.max_vaddr.div_ceil(PAGE_SIZE as u32) * PAGE_SIZE as u32;
            let proc = self.pm.get_mut(pid).unwrap();
            proc.entry = image.entry;
            proc.user_stack_top = USER_STACK_TOP;
            proc.heap_base = heap_base;
            proc.heap_end = heap_base;
            proc.set_args(args);
            proc.frame = TrapFrame::user(image.entry, USER_STACK_TOP);
        }

        let priority = self.pm.get(pid).unwrap().priority;
        self.sched.enqueue(pid, priority);
        log::info!("spawned {:?} as pid {}", path, pid);
        Ok(pid)
    }

    /// Replace the current process's image. Validation happens before
    /// anything is torn down, so failures leave the caller untouched
    /// and surface as -1; the caller resumes at the new entry point on
    /// success (the live frame is rewritten).
    pub fn exec_current(
        &mut self,
        frame: &mut TrapFrame,
        path: &str,
        args: &[u8],
    ) -> Option<i32> {
        let (data, image) = match self.read_executable(path) {
            Ok(v) => v,
            Err(_) => return Some(-1),
        };
        let pid = self.pm.current_pid()?;

        // Point of no return: drop the old user image.
        {
            let Kernel {
                ref phys,
                ref mut frames,
                ref mut pm,
                ..
            } = *self;
            let proc = pm.get_mut(pid).unwrap();
            proc.space.clear_user(phys, frames);
        }

        let space = self.pm.get(pid).unwrap().space;
        if let Err(e) = self.load_image(space, &image, &data) {
            // The old image is gone and the new one did not fit; the
            // process cannot continue.
            log::error!("exec of {:?} failed after teardown: {}", path, e);
            self.exit_current(frame, crate::process::EXIT_CODE_FAULTED);
            return None;
        }

        {
            let heap_base = image.max_vaddr.div_ceil(PAGE_SIZE as u32) * PAGE_SIZE as u32;
            let proc = self.pm.get_mut(pid).unwrap();
            proc.name = base_name(path).to_string();
            proc.entry = image.entry;
            proc.user_stack_top = USER_STACK_TOP;
            proc.heap_base = heap_base;
            proc.heap_end = heap_base;
            proc.set_args(args);
            debug_assert!(matches!(proc.state, ProcessState::Running));
            *frame = TrapFrame::user(image.entry, USER_STACK_TOP);
        }
        None
    }

    /// Current cwd string helper used by path syscalls.
    pub(crate) fn current_cwd(&self) -> String {
        self.pm
            .current()
            .map(|p| p.cwd.clone())
            .unwrap_or_else(|| self.pm.default_cwd.clone())
    }
}
