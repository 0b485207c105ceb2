//! Interrupt entry stubs
//!
//! Every vector funnels into one common assembly path that builds the
//! uniform [`crate::trap::TrapFrame`]: stub pushes (error code where
//! the CPU does not, then the vector), `pusha`, segment saves, kernel
//! data segments, kernel CR3 — then calls the Rust `trap_entry` with a
//! pointer to the frame. The return path consults the trampoline flag
//! and reloads the staged user CR3 just before `iretd`; see
//! [`super::trampoline`] for the shared state contract.

use core::arch::global_asm;

// Common entry/exit. Interrupt gates enter with IF clear and it stays
// clear until iretd, so nothing here can be preempted.
global_asm!(
    r#"
.section .text
.global trap_common
trap_common:
    pusha
    push ds
    push es
    push fs
    push gs
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    // Enter the kernel address space (KPTI entry trampoline).
    mov eax, [TRAMPOLINE_KERNEL_CR3]
    test eax, eax
    jz 1f
    mov cr3, eax
1:
    push esp
    call trap_entry
    add esp, 4
    // Exit trampoline: reload the staged user CR3 when returning to
    // ring 3. The flag is one-shot.
    mov eax, [TRAMPOLINE_RETURN_TO_USER]
    test eax, eax
    jz 2f
    mov dword ptr [TRAMPOLINE_RETURN_TO_USER], 0
    mov eax, [TRAMPOLINE_USER_CR3]
    mov cr3, eax
2:
    pop gs
    pop fs
    pop es
    pop ds
    popa
    add esp, 8
    iretd
"#
);

// Ring-0 idle loop the scheduler parks the CPU on when nothing is
// ready; interrupts wake it and may dispatch straight into a process.
global_asm!(
    r#"
.section .text
.global idle_loop
idle_loop:
    sti
    hlt
    jmp idle_loop
"#
);

/// Emit a stub for a vector where the CPU pushes no error code.
macro_rules! trap_stub {
    ($name:ident, $vector:expr) => {
        global_asm!(concat!(
            ".section .text\n",
            ".global ",
            stringify!($name),
            "\n",
            stringify!($name),
            ":\n",
            "    push 0\n",
            "    push ",
            stringify!($vector),
            "\n",
            "    jmp trap_common\n",
        ));
        extern "C" {
            pub fn $name();
        }
    };
}

/// Emit a stub for a vector where the CPU pushed an error code.
macro_rules! trap_stub_err {
    ($name:ident, $vector:expr) => {
        global_asm!(concat!(
            ".section .text\n",
            ".global ",
            stringify!($name),
            "\n",
            stringify!($name),
            ":\n",
            "    push ",
            stringify!($vector),
            "\n",
            "    jmp trap_common\n",
        ));
        extern "C" {
            pub fn $name();
        }
    };
}

// Exception vectors 0..31. The CPU pushes an error code for 8, 10-14
// and 17; the rest get a dummy zero for the uniform frame.
trap_stub!(isr0, 0);
trap_stub!(isr1, 1);
trap_stub!(isr2, 2);
trap_stub!(isr3, 3);
trap_stub!(isr4, 4);
trap_stub!(isr5, 5);
trap_stub!(isr6, 6);
trap_stub!(isr7, 7);
trap_stub_err!(isr8, 8);
trap_stub!(isr9, 9);
trap_stub_err!(isr10, 10);
trap_stub_err!(isr11, 11);
trap_stub_err!(isr12, 12);
trap_stub_err!(isr13, 13);
trap_stub_err!(isr14, 14);
trap_stub!(isr15, 15);
trap_stub!(isr16, 16);
trap_stub_err!(isr17, 17);
trap_stub!(isr18, 18);
trap_stub!(isr19, 19);
trap_stub!(isr20, 20);
trap_stub!(isr21, 21);
trap_stub!(isr22, 22);
trap_stub!(isr23, 23);
trap_stub!(isr24, 24);
trap_stub!(isr25, 25);
trap_stub!(isr26, 26);
trap_stub!(isr27, 27);
trap_stub!(isr28, 28);
trap_stub!(isr29, 29);
trap_stub!(isr30, 30);
trap_stub!(isr31, 31);

// Remapped IRQ vectors 32..47.
trap_stub!(irq0, 32);
trap_stub!(irq1, 33);
trap_stub!(irq2, 34);
trap_stub!(irq3, 35);
trap_stub!(irq4, 36);
trap_stub!(irq5, 37);
trap_stub!(irq6, 38);
trap_stub!(irq7, 39);
trap_stub!(irq8, 40);
trap_stub!(irq9, 41);
trap_stub!(irq10, 42);
trap_stub!(irq11, 43);
trap_stub!(irq12, 44);
trap_stub!(irq13, 45);
trap_stub!(irq14, 46);
trap_stub!(irq15, 47);

// Syscall gate (vector 0x80, DPL 3).
trap_stub!(syscall_stub, 128);

/// Exception stub addresses by vector.
pub static EXCEPTION_STUBS: [unsafe extern "C" fn(); 32] = [
    isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13,
    isr14, isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26,
    isr27, isr28, isr29, isr30, isr31,
];

/// IRQ stub addresses by line.
pub static IRQ_STUBS: [unsafe extern "C" fn(); 16] = [
    irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10, irq11, irq12, irq13,
    irq14, irq15,
];
