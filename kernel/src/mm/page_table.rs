//! Page-table engine
//!
//! Two-level i386 paging. Each [`AddressSpace`] owns a page directory
//! frame and the leaf tables hanging off its user half; the kernel half
//! (directory slots 768 and up, `0xC000_0000+`) is copied verbatim from
//! the kernel template at creation time and is identical in every
//! address space, so the kernel is globally mapped and never freed by
//! [`AddressSpace::destroy`].
//!
//! Every mutation of a leaf entry goes through one edit-and-invalidate
//! path, and all physical access is via the [`PhysWindow`] — user
//! virtual addresses are never dereferenced, which is also what the
//! syscall layer's pointer-validation rule relies on.

use bitflags::bitflags;

use crate::arch;
use crate::error::{KernelError, KernelResult};
use crate::mm::{
    frame::FrameAllocator, user_span_in_window, PhysAddr, PhysWindow, VirtAddr, KERNEL_VIRT_BASE,
    PAGE_SIZE,
};

/// Entries per directory or leaf table.
pub const PAGE_TABLE_ENTRIES: usize = 1024;

/// First directory slot of the shared kernel half (0xC0000000 >> 22).
pub const KERNEL_PDE_FIRST: usize = (KERNEL_VIRT_BASE >> 22) as usize;

bitflags! {
    /// Page-table entry flags. `COW` lives in a software-available bit;
    /// a COW page is always present, user and non-writable until the
    /// first write materializes a private copy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
        /// 4 MiB PSE entry (kernel direct map only).
        const HUGE     = 1 << 7;
        /// Software bit: shared copy-on-write mapping.
        const COW      = 1 << 9;
    }
}

/// One page directory or page table entry.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct PageTableEntry(u32);

impl PageTableEntry {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_present(self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & 0xFFF)
    }

    pub const fn addr(self) -> PhysAddr {
        PhysAddr::new(self.0 & 0xFFFF_F000)
    }

    pub fn set(&mut self, phys: PhysAddr, flags: PageFlags) {
        debug_assert!(phys.is_page_aligned());
        self.0 = phys.as_u32() | flags.bits() | PageFlags::PRESENT.bits();
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// A 4 KiB-aligned table of 1024 entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; PAGE_TABLE_ENTRIES],
}

impl PageTable {
    pub fn zero(&mut self) {
        for e in &mut self.entries {
            e.clear();
        }
    }

    pub fn entry(&self, idx: usize) -> PageTableEntry {
        self.entries[idx]
    }

    pub fn entry_mut(&mut self, idx: usize) -> &mut PageTableEntry {
        &mut self.entries[idx]
    }
}

/// A page directory plus the user leaf tables it owns.
///
/// This is a handle; the tables themselves live in physical frames and
/// are reached through the caller-supplied [`PhysWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace {
    dir: PhysAddr,
}

impl AddressSpace {
    /// Build the kernel template: PSE 4 MiB entries direct-mapping
    /// physical `[0, phys_limit)` at `KERNEL_VIRT_BASE`, supervisor
    /// only. Every later address space copies this half verbatim.
    pub fn kernel_template(
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        phys_limit: u32,
    ) -> KernelResult<Self> {
        let dir = frames.alloc()?;
        unsafe { win.zero_frame(dir) };
        let space = Self { dir };
        let table = unsafe { space.table(win, dir) };
        let huge = PAGE_SIZE as u32 * 1024;
        let slots = phys_limit.div_ceil(huge) as usize;
        for i in 0..slots {
            let phys = PhysAddr::new(i as u32 * huge);
            table
                .entry_mut(KERNEL_PDE_FIRST + i)
                .set(phys, PageFlags::WRITABLE | PageFlags::HUGE);
        }
        Ok(space)
    }

    /// Create a fresh address space sharing the template's kernel half.
    pub fn new(
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        template: &AddressSpace,
    ) -> KernelResult<Self> {
        let dir = frames.alloc()?;
        unsafe { win.zero_frame(dir) };
        let space = Self { dir };
        let src = unsafe { template.table(win, template.dir) };
        let dst = unsafe { space.table(win, dir) };
        for i in KERNEL_PDE_FIRST..PAGE_TABLE_ENTRIES {
            *dst.entry_mut(i) = src.entry(i);
        }
        Ok(space)
    }

    /// Physical address of the directory, i.e. the CR3 value.
    pub const fn directory_phys(&self) -> PhysAddr {
        self.dir
    }

    /// Raw directory entry, for diagnostics and invariant checks.
    pub fn directory_entry(&self, win: &PhysWindow, idx: usize) -> u32 {
        unsafe { self.table(win, self.dir) }.entry(idx).raw()
    }

    /// View a table frame through the window.
    ///
    /// # Safety
    ///
    /// `phys` must be a live directory or leaf-table frame of this
    /// address space; the returned reference must not outlive it or
    /// alias another mutable view of the same frame.
    #[allow(clippy::mut_from_ref)]
    unsafe fn table<'a>(&self, win: &PhysWindow, phys: PhysAddr) -> &'a mut PageTable {
        unsafe { &mut *(win.ptr(phys) as *mut PageTable) }
    }

    /// Find the leaf entry for `virt`, if its table exists.
    fn leaf<'a>(&self, win: &PhysWindow, virt: VirtAddr) -> Option<&'a mut PageTableEntry> {
        let dir = unsafe { self.table(win, self.dir) };
        let pde = dir.entry(virt.directory_index());
        if !pde.is_present() || pde.flags().contains(PageFlags::HUGE) {
            return None;
        }
        let table = unsafe { self.table(win, pde.addr()) };
        Some(table.entry_mut(virt.table_index()))
    }

    /// Install or replace a mapping.
    ///
    /// Policy: the kernel half is immutable here, and any mapping with
    /// the user bit must fall inside the user window.
    pub fn map(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        virt: VirtAddr,
        phys: PhysAddr,
        flags: PageFlags,
    ) -> KernelResult<()> {
        if virt.page_offset() != 0 || !phys.is_page_aligned() {
            return Err(KernelError::InvalidArgument);
        }
        if virt.directory_index() >= KERNEL_PDE_FIRST {
            return Err(KernelError::PermissionDenied);
        }
        if flags.contains(PageFlags::USER) && !user_span_in_window(virt.as_u32(), PAGE_SIZE as u32)
        {
            return Err(KernelError::PermissionDenied);
        }

        let dir = unsafe { self.table(win, self.dir) };
        let pde = dir.entry_mut(virt.directory_index());
        if !pde.is_present() {
            let table_frame = frames.alloc()?;
            unsafe { win.zero_frame(table_frame) };
            pde.set(table_frame, PageFlags::WRITABLE | PageFlags::USER);
        } else if flags.contains(PageFlags::USER) && !pde.flags().contains(PageFlags::USER) {
            let addr = pde.addr();
            pde.set(addr, pde.flags() | PageFlags::USER);
        }

        let table = unsafe { self.table(win, pde.addr()) };
        table.entry_mut(virt.table_index()).set(phys, flags);
        arch::flush_tlb(virt.as_u32());
        Ok(())
    }

    /// Allocate a zeroed frame and map it at `virt`.
    pub fn map_alloc(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        virt: VirtAddr,
        flags: PageFlags,
    ) -> KernelResult<PhysAddr> {
        let phys = frames.alloc()?;
        unsafe { win.zero_frame(phys) };
        if let Err(e) = self.map(win, frames, virt, phys, flags) {
            frames.free(phys);
            return Err(e);
        }
        Ok(phys)
    }

    /// Remove a mapping; with `free_frame` the target frame's refcount
    /// is dropped through the frame allocator.
    pub fn unmap(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        virt: VirtAddr,
        free_frame: bool,
    ) -> KernelResult<()> {
        let entry = self
            .leaf(win, virt)
            .ok_or(KernelError::NotMapped { virt: virt.as_u32() })?;
        if !entry.is_present() {
            return Err(KernelError::NotMapped { virt: virt.as_u32() });
        }
        let phys = entry.addr();
        entry.clear();
        arch::flush_tlb(virt.as_u32());
        if free_frame {
            frames.free(phys);
        }
        Ok(())
    }

    /// Translate a virtual address, following PSE entries in the
    /// kernel half.
    pub fn translate(&self, win: &PhysWindow, virt: VirtAddr) -> Option<PhysAddr> {
        self.translate_flags(win, virt).map(|(p, _)| p)
    }

    pub fn translate_flags(
        &self,
        win: &PhysWindow,
        virt: VirtAddr,
    ) -> Option<(PhysAddr, PageFlags)> {
        let dir = unsafe { self.table(win, self.dir) };
        let pde = dir.entry(virt.directory_index());
        if !pde.is_present() {
            return None;
        }
        if pde.flags().contains(PageFlags::HUGE) {
            let base = pde.raw() & 0xFFC0_0000;
            return Some((
                PhysAddr::new(base + (virt.as_u32() & 0x003F_FFFF)),
                pde.flags(),
            ));
        }
        let table = unsafe { self.table(win, pde.addr()) };
        let pte = table.entry(virt.table_index());
        if !pte.is_present() {
            return None;
        }
        Some((PhysAddr::new(pte.addr().as_u32() + virt.page_offset()), pte.flags()))
    }

    /// Atomic bit edit on a leaf entry, with TLB invalidation. The only
    /// way flags change after `map`.
    pub fn update_flags(
        &self,
        win: &PhysWindow,
        virt: VirtAddr,
        set: PageFlags,
        clear: PageFlags,
    ) -> KernelResult<()> {
        let entry = self
            .leaf(win, virt)
            .ok_or(KernelError::NotMapped { virt: virt.as_u32() })?;
        if !entry.is_present() {
            return Err(KernelError::NotMapped { virt: virt.as_u32() });
        }
        let addr = entry.addr();
        let flags = (entry.flags() | set) - clear;
        entry.set(addr, flags);
        arch::flush_tlb(virt.as_u32());
        Ok(())
    }

    /// True iff every page of `[addr, addr+len)` is present and
    /// user-accessible. The syscall layer's pointer validation.
    pub fn user_range_mapped(&self, win: &PhysWindow, addr: u32, len: u32) -> bool {
        if !user_span_in_window(addr, len) {
            return false;
        }
        let first = VirtAddr::new(addr).align_down().as_u32();
        let last = VirtAddr::new(addr + len.saturating_sub(1)).align_down().as_u32();
        let mut page = first;
        loop {
            match self.translate_flags(win, VirtAddr::new(page)) {
                Some((_, flags)) if flags.contains(PageFlags::USER) => {}
                _ => return false,
            }
            if page == last {
                return true;
            }
            page += PAGE_SIZE as u32;
        }
    }

    /// Walk the span page by page, re-validating at every boundary, and
    /// hand each physical chunk to `visit`. `require` must hold on each
    /// page's flags.
    fn walk_user_span(
        &self,
        win: &PhysWindow,
        addr: u32,
        len: usize,
        require: PageFlags,
        mut visit: impl FnMut(PhysAddr, usize, usize),
    ) -> KernelResult<()> {
        if len == 0 {
            return Ok(());
        }
        if !user_span_in_window(addr, len as u32) {
            return Err(KernelError::BadUserPointer { addr, len: len as u32 });
        }
        let mut done = 0usize;
        while done < len {
            let cur = addr + done as u32;
            let page_left = PAGE_SIZE - VirtAddr::new(cur).page_offset() as usize;
            let chunk = page_left.min(len - done);
            let (phys, flags) = self
                .translate_flags(win, VirtAddr::new(cur))
                .ok_or(KernelError::BadUserPointer { addr, len: len as u32 })?;
            if !flags.contains(require) {
                return Err(KernelError::BadUserPointer { addr, len: len as u32 });
            }
            visit(phys, done, chunk);
            done += chunk;
        }
        Ok(())
    }

    /// Copy user bytes into a kernel buffer. The source may cross page
    /// boundaries whose frames are not physically contiguous.
    pub fn copy_from_user(&self, win: &PhysWindow, dst: &mut [u8], src: u32) -> KernelResult<()> {
        self.walk_user_span(
            win,
            src,
            dst.len(),
            PageFlags::PRESENT | PageFlags::USER,
            |phys, off, chunk| {
                let bytes = unsafe { win.bytes(phys, chunk) };
                dst[off..off + chunk].copy_from_slice(bytes);
            },
        )
    }

    /// Copy kernel bytes out to user memory. A COW destination page is
    /// materialized first; a page that is neither writable nor COW
    /// fails the whole transfer.
    pub fn copy_to_user(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        dst: u32,
        src: &[u8],
    ) -> KernelResult<()> {
        self.break_cow_span(win, frames, dst, src.len())?;
        self.walk_user_span(
            win,
            dst,
            src.len(),
            PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE,
            |phys, off, chunk| {
                let bytes = unsafe { win.bytes_mut(phys, chunk) };
                bytes.copy_from_slice(&src[off..off + chunk]);
            },
        )
    }

    /// Fill user memory with `value`, page by page.
    pub fn memset_user(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        dst: u32,
        value: u8,
        len: u32,
    ) -> KernelResult<()> {
        self.break_cow_span(win, frames, dst, len as usize)?;
        self.walk_user_span(
            win,
            dst,
            len as usize,
            PageFlags::PRESENT | PageFlags::USER | PageFlags::WRITABLE,
            |phys, _off, chunk| {
                let bytes = unsafe { win.bytes_mut(phys, chunk) };
                bytes.fill(value);
            },
        )
    }

    /// Materialize any COW page inside the span before a kernel-side
    /// write, mirroring what the fault path would do for a user store.
    fn break_cow_span(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        addr: u32,
        len: usize,
    ) -> KernelResult<()> {
        if len == 0 {
            return Ok(());
        }
        if !user_span_in_window(addr, len as u32) {
            return Err(KernelError::BadUserPointer { addr, len: len as u32 });
        }
        let mut page = VirtAddr::new(addr).align_down().as_u32();
        let last = VirtAddr::new(addr + (len as u32 - 1)).align_down().as_u32();
        loop {
            if let Some((_, flags)) = self.translate_flags(win, VirtAddr::new(page)) {
                if flags.contains(PageFlags::COW) && !self.handle_cow(win, frames, page) {
                    return Err(KernelError::OutOfFrames);
                }
            }
            if page == last {
                return Ok(());
            }
            page += PAGE_SIZE as u32;
        }
    }

    /// Service a write fault on a COW mapping.
    ///
    /// Returns false unless the faulting page is a present, user,
    /// non-writable, COW-flagged leaf entry — the caller then treats
    /// the fault as fatal for the process.
    pub fn handle_cow(&self, win: &PhysWindow, frames: &mut FrameAllocator, fault_addr: u32) -> bool {
        let page = VirtAddr::new(fault_addr).align_down();
        let entry = match self.leaf(win, page) {
            Some(e) => e,
            None => return false,
        };
        let flags = entry.flags();
        if !entry.is_present()
            || !flags.contains(PageFlags::USER)
            || flags.contains(PageFlags::WRITABLE)
            || !flags.contains(PageFlags::COW)
        {
            return false;
        }

        let old = entry.addr();
        let new_flags = (flags | PageFlags::WRITABLE) - PageFlags::COW;
        if frames.refcount(old) == 1 {
            // Last sharer: the frame becomes private in place.
            entry.set(old, new_flags);
        } else {
            let new = match frames.alloc() {
                Ok(f) => f,
                Err(_) => return false,
            };
            unsafe {
                let src = win.bytes(old, PAGE_SIZE);
                win.bytes_mut(new, PAGE_SIZE).copy_from_slice(src);
            }
            frames.free(old);
            entry.set(new, new_flags);
        }
        arch::flush_tlb(page.as_u32());
        true
    }

    /// Duplicate every user mapping into `child` with write permission
    /// cleared and COW marked on both sides, retaining each backing
    /// frame for the new sharer. The fork engine.
    pub fn clone_user_cow(
        &self,
        win: &PhysWindow,
        frames: &mut FrameAllocator,
        child: &AddressSpace,
    ) -> KernelResult<()> {
        let dir = unsafe { self.table(win, self.dir) };
        for pde_idx in 0..KERNEL_PDE_FIRST {
            let pde = dir.entry(pde_idx);
            if !pde.is_present() {
                continue;
            }
            let table = unsafe { self.table(win, pde.addr()) };
            for pte_idx in 0..PAGE_TABLE_ENTRIES {
                let entry = table.entry(pte_idx);
                if !entry.is_present() {
                    continue;
                }
                let virt = VirtAddr::new(((pde_idx as u32) << 22) | ((pte_idx as u32) << 12));
                let phys = entry.addr();
                let shared = (entry.flags() | PageFlags::COW) - PageFlags::WRITABLE;

                table.entry_mut(pte_idx).set(phys, shared);
                arch::flush_tlb(virt.as_u32());

                child.map(win, frames, virt, phys, shared)?;
                frames.retain(phys);
            }
        }
        Ok(())
    }

    /// Release every user mapping and leaf table, keeping the directory
    /// (and the shared kernel half) intact. Used by exec.
    pub fn clear_user(&self, win: &PhysWindow, frames: &mut FrameAllocator) {
        let dir = unsafe { self.table(win, self.dir) };
        for pde_idx in 0..KERNEL_PDE_FIRST {
            let pde = dir.entry(pde_idx);
            if !pde.is_present() {
                continue;
            }
            let table = unsafe { self.table(win, pde.addr()) };
            for pte_idx in 0..PAGE_TABLE_ENTRIES {
                let entry = table.entry(pte_idx);
                if entry.is_present() {
                    frames.free(entry.addr());
                    table.entry_mut(pte_idx).clear();
                }
            }
            frames.free(pde.addr());
            dir.entry_mut(pde_idx).clear();
        }
        arch::flush_tlb_all();
    }

    /// Release the whole address space: user mappings, leaf tables,
    /// then the directory itself. Kernel-shared structures are left
    /// alone. Only called once the owning process is reaped.
    pub fn destroy(self, win: &PhysWindow, frames: &mut FrameAllocator) {
        self.clear_user(win, frames);
        frames.free(self.dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::FRAME_POOL_START;
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;

    /// One page's worth of bytes, aligned like a real physical frame.
    ///
    /// `Vec<u8>` is only guaranteed byte alignment, but the page-table
    /// code dereferences arena pointers as `repr(align(4096))` structs,
    /// so the arena backing the test `PhysWindow` must start on a page
    /// boundary.
    #[repr(align(4096))]
    #[derive(Clone, Copy)]
    #[allow(dead_code)]
    struct AlignedPage([u8; PAGE_SIZE]);

    struct Fixture {
        // Keeps the arena alive for the window's lifetime.
        _arena: Vec<AlignedPage>,
        win: PhysWindow,
        frames: Box<FrameAllocator>,
        template: AddressSpace,
    }

    fn fixture(frame_count: usize) -> Fixture {
        let mut arena = vec![AlignedPage([0u8; PAGE_SIZE]); frame_count];
        let base = PhysAddr::new(FRAME_POOL_START);
        let win = PhysWindow::for_arena(arena.as_mut_ptr() as *mut u8, base);
        let mut frames = Box::new(FrameAllocator::empty());
        frames.init(base, frame_count);
        let template = AddressSpace::kernel_template(&win, &mut frames, 0x0800_0000).unwrap();
        Fixture {
            _arena: arena,
            win,
            frames,
            template,
        }
    }

    const USER_PAGE: u32 = crate::mm::USER_SPACE_START;

    #[test]
    fn new_space_shares_kernel_half() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        for i in KERNEL_PDE_FIRST..PAGE_TABLE_ENTRIES {
            assert_eq!(
                space.directory_entry(&fx.win, i),
                fx.template.directory_entry(&fx.win, i),
                "kernel half differs at slot {}",
                i
            );
        }
    }

    #[test]
    fn map_translate_unmap() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        assert_eq!(
            space.translate(&fx.win, VirtAddr::new(USER_PAGE + 5)),
            Some(PhysAddr::new(phys.as_u32() + 5))
        );
        space
            .unmap(&fx.win, &mut fx.frames, VirtAddr::new(USER_PAGE), true)
            .unwrap();
        assert_eq!(space.translate(&fx.win, VirtAddr::new(USER_PAGE)), None);
        assert_eq!(fx.frames.refcount(phys), 0);
    }

    #[test]
    fn kernel_half_translates_through_pse() {
        let fx = fixture(8);
        let virt = VirtAddr::new(KERNEL_VIRT_BASE + 0x0040_1234);
        assert_eq!(
            fx.template.translate(&fx.win, virt),
            Some(PhysAddr::new(0x0040_1234))
        );
    }

    #[test]
    fn user_flag_outside_window_is_rejected() {
        let mut fx = fixture(8);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = fx.frames.alloc().unwrap();
        let err = space.map(
            &fx.win,
            &mut fx.frames,
            VirtAddr::new(0x0000_1000),
            phys,
            PageFlags::WRITABLE | PageFlags::USER,
        );
        assert_eq!(err, Err(KernelError::PermissionDenied));
        let err = space.map(
            &fx.win,
            &mut fx.frames,
            VirtAddr::new(KERNEL_VIRT_BASE),
            phys,
            PageFlags::WRITABLE,
        );
        assert_eq!(err, Err(KernelError::PermissionDenied));
    }

    #[test]
    fn copies_cross_noncontiguous_pages() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        // Map two consecutive virtual pages onto frames in reversed
        // physical order so contiguity assumptions would be caught.
        let a = fx.frames.alloc().unwrap();
        let b = fx.frames.alloc().unwrap();
        let flags = PageFlags::WRITABLE | PageFlags::USER;
        space
            .map(&fx.win, &mut fx.frames, VirtAddr::new(USER_PAGE), b, flags)
            .unwrap();
        space
            .map(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE + PAGE_SIZE as u32),
                a,
                flags,
            )
            .unwrap();

        let msg: Vec<u8> = (0..512u32).map(|i| i as u8).collect();
        let dst = USER_PAGE + PAGE_SIZE as u32 - 100;
        space.copy_to_user(&fx.win, &mut fx.frames, dst, &msg).unwrap();

        let mut back = vec![0u8; msg.len()];
        space.copy_from_user(&fx.win, &mut back, dst).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn memset_user_fills_span() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        space
            .memset_user(&fx.win, &mut fx.frames, USER_PAGE + 8, 0x5A, 16)
            .unwrap();
        let mut buf = [0u8; 18];
        space
            .copy_from_user(&fx.win, &mut buf, USER_PAGE + 7)
            .unwrap();
        assert_eq!(buf[0], 0);
        assert!(buf[1..17].iter().all(|&b| b == 0x5A));
        assert_eq!(buf[17], 0);
    }

    #[test]
    fn update_flags_edits_one_leaf_entry() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        space
            .update_flags(
                &fx.win,
                VirtAddr::new(USER_PAGE),
                PageFlags::COW,
                PageFlags::WRITABLE,
            )
            .unwrap();
        let (p, flags) = space
            .translate_flags(&fx.win, VirtAddr::new(USER_PAGE))
            .unwrap();
        assert_eq!(p.align_down(), phys);
        assert!(flags.contains(PageFlags::COW));
        assert!(!flags.contains(PageFlags::WRITABLE));
        assert!(flags.contains(PageFlags::USER));
        // Editing an unmapped page is an error, not a silent install.
        assert!(space
            .update_flags(
                &fx.win,
                VirtAddr::new(USER_PAGE + PAGE_SIZE as u32),
                PageFlags::COW,
                PageFlags::empty(),
            )
            .is_err());
    }

    #[test]
    fn user_range_mapped_rejects_partial_spans() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        assert!(space.user_range_mapped(&fx.win, USER_PAGE, PAGE_SIZE as u32));
        assert!(!space.user_range_mapped(&fx.win, USER_PAGE, PAGE_SIZE as u32 + 1));
        assert!(!space.user_range_mapped(&fx.win, 0x1000, 4));
        assert!(!space.user_range_mapped(&fx.win, KERNEL_VIRT_BASE, 4));
    }

    #[test]
    fn copy_rejects_unmapped_and_leaves_no_side_effects() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let before = fx.frames.stats();
        let err = space.copy_to_user(&fx.win, &mut fx.frames, USER_PAGE, b"data");
        assert!(err.is_err());
        assert_eq!(fx.frames.stats(), before);
    }

    #[test]
    fn cow_private_page_promotes_in_place() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::USER | PageFlags::COW,
            )
            .unwrap();
        assert!(space.handle_cow(&fx.win, &mut fx.frames, USER_PAGE + 40));
        let (p, flags) = space
            .translate_flags(&fx.win, VirtAddr::new(USER_PAGE))
            .unwrap();
        assert_eq!(p.align_down(), phys);
        assert!(flags.contains(PageFlags::WRITABLE));
        assert!(!flags.contains(PageFlags::COW));
        assert_eq!(fx.frames.refcount(phys), 1);
    }

    #[test]
    fn cow_shared_page_copies_and_drops_refcount() {
        let mut fx = fixture(32);
        let parent = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = parent
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        parent
            .copy_to_user(&fx.win, &mut fx.frames, USER_PAGE, b"cow-check")
            .unwrap();

        let child = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        parent
            .clone_user_cow(&fx.win, &mut fx.frames, &child)
            .unwrap();
        assert_eq!(fx.frames.refcount(phys), 2);
        for space in [&parent, &child] {
            let (_, flags) = space
                .translate_flags(&fx.win, VirtAddr::new(USER_PAGE))
                .unwrap();
            assert!(flags.contains(PageFlags::COW));
            assert!(!flags.contains(PageFlags::WRITABLE));
        }

        // Child writes: gets a private copy, old frame refcount drops.
        assert!(child.handle_cow(&fx.win, &mut fx.frames, USER_PAGE));
        let (child_phys, child_flags) = child
            .translate_flags(&fx.win, VirtAddr::new(USER_PAGE))
            .unwrap();
        assert_ne!(child_phys.align_down(), phys);
        assert!(child_flags.contains(PageFlags::WRITABLE));
        assert!(!child_flags.contains(PageFlags::COW));
        assert_eq!(fx.frames.refcount(phys), 1);
        assert_eq!(fx.frames.refcount(child_phys.align_down()), 1);

        // The copy carried the bytes.
        let mut buf = [0u8; 9];
        child.copy_from_user(&fx.win, &mut buf, USER_PAGE).unwrap();
        assert_eq!(&buf, b"cow-check");
    }

    #[test]
    fn handle_cow_rejects_non_cow_faults() {
        let mut fx = fixture(16);
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        // Not mapped at all.
        assert!(!space.handle_cow(&fx.win, &mut fx.frames, USER_PAGE));
        // Mapped writable (no COW).
        space
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        assert!(!space.handle_cow(&fx.win, &mut fx.frames, USER_PAGE));
    }

    #[test]
    fn destroy_returns_every_frame() {
        let mut fx = fixture(32);
        let baseline = fx.frames.allocated();
        let space = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        for i in 0..4u32 {
            space
                .map_alloc(
                    &fx.win,
                    &mut fx.frames,
                    VirtAddr::new(USER_PAGE + i * PAGE_SIZE as u32),
                    PageFlags::WRITABLE | PageFlags::USER,
                )
                .unwrap();
        }
        assert!(fx.frames.allocated() > baseline);
        space.destroy(&fx.win, &mut fx.frames);
        assert_eq!(fx.frames.allocated(), baseline);
    }

    #[test]
    fn destroyed_space_leaves_shared_frames_alive() {
        let mut fx = fixture(32);
        let parent = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        let phys = parent
            .map_alloc(
                &fx.win,
                &mut fx.frames,
                VirtAddr::new(USER_PAGE),
                PageFlags::WRITABLE | PageFlags::USER,
            )
            .unwrap();
        let child = AddressSpace::new(&fx.win, &mut fx.frames, &fx.template).unwrap();
        parent
            .clone_user_cow(&fx.win, &mut fx.frames, &child)
            .unwrap();
        child.destroy(&fx.win, &mut fx.frames);
        // Parent's mapping still backed.
        assert_eq!(fx.frames.refcount(phys), 1);
        let mut b = [0u8; 1];
        parent.copy_from_user(&fx.win, &mut b, USER_PAGE).unwrap();
    }
}
