use dotmatrix_core::machine::Machine;

/// Build a machine whose ROM contains `program` at the post-boot entry
/// point 0x0100, with NOPs everywhere else.
pub fn machine_with_program(program: &[u8]) -> Machine {
    let mut rom = vec![0u8; 0x8000];
    rom[0x100..0x100 + program.len()].copy_from_slice(program);
    let mut machine = Machine::new();
    machine.load_rom(rom);
    machine
}

#[allow(dead_code)]
pub fn run_steps(machine: &mut Machine, steps: usize) {
    for _ in 0..steps {
        machine.simulate();
    }
}
