//! Multiboot entry and boot paging
//!
//! The loader drops us in 32-bit protected mode with paging off,
//! `eax` = multiboot magic and `ebx` = the physical address of the boot
//! information. The entry stub builds a provisional page directory of
//! 4 MiB PSE entries mapping the first 128 MiB both identity and at
//! `KERNEL_VIRT_BASE`, turns paging on, moves the stack into the high
//! half and calls `kernel_entry` (in `main.rs`). The identity window
//! disappears when `kernel_entry` switches to the kernel template
//! directory built by the memory manager.

use core::arch::global_asm;

/// Boot stack; 16 KiB is plenty for init, and the same stack later
/// serves the idle context.
#[no_mangle]
static mut BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

const BOOT_STACK_SIZE: usize = 16 * 1024;

#[repr(C, align(16))]
struct BootStack([u8; BOOT_STACK_SIZE]);

/// Provisional page directory used only between `_start` and the
/// switch to the kernel template.
#[no_mangle]
static mut BOOT_PAGE_DIRECTORY: BootPageDirectory = BootPageDirectory([0; 1024]);

#[repr(C, align(4096))]
struct BootPageDirectory([u32; 1024]);

global_asm!(
    r#"
// Multiboot v1 header: page-align modules, provide memory info.
.section .multiboot, "a"
.align 4
.long 0x1BADB002
.long 0x00000003
.long -(0x1BADB002 + 0x00000003)

.section .text
.global _start
_start:
    cli
    mov esi, eax                      // save multiboot magic

    // Physical address of the boot directory (statics link high).
    lea edi, [BOOT_PAGE_DIRECTORY]
    sub edi, 0xC0000000

    // 32 PSE entries: identity and higher-half views of 0..128 MiB.
    xor ecx, ecx
1:
    mov eax, ecx
    shl eax, 22
    or eax, 0x83                      // present | writable | 4 MiB
    mov [edi + ecx*4], eax
    mov [edi + ecx*4 + 768*4], eax
    inc ecx
    cmp ecx, 32
    jl 1b

    // CR4.PSE, then paging + write protect.
    mov eax, cr4
    or eax, 0x10
    mov cr4, eax
    mov cr3, edi
    mov eax, cr0
    or eax, 0x80010000
    mov cr0, eax

    // Jump into the high half.
    lea eax, [2f]
    jmp eax
2:
    lea esp, [BOOT_STACK]
    add esp, {stack_size}
    push ebx                          // multiboot info (physical)
    push esi                          // multiboot magic
    call kernel_entry
3:
    hlt
    jmp 3b
"#,
    stack_size = const BOOT_STACK_SIZE,
);
