use thiserror::Error;

use crate::gpu::Gpu;

const VRAM_SIZE: usize = 0x2000;
const WRAM_SIZE: usize = 0x2000;
const OAM_SIZE: usize = 0xA0;
const HRAM_SIZE: usize = 0x7F;
const IO_SIZE: usize = 0x80;

// Interrupt registers (gbdev.io/pandocs/Interrupts.html)
const REG_IF: u16 = 0xFF0F;
const REG_LY: u16 = 0xFF44;
const REG_BOOT_OFF: u16 = 0xFF50;

/// Fault raised by the fallible bus accessors.
///
/// The regular `read8`/`write8` path never fails (unmapped regions behave as
/// open bus); the `try_*` variants report faults so speculative debugger
/// accesses can be caught instead of silently returning garbage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusFault {
    #[error("read from unmapped address {addr:#06x}")]
    UnmappedRead { addr: u16 },
    #[error("write to unmapped address {addr:#06x}")]
    UnmappedWrite { addr: u16 },
    #[error("write to read-only address {addr:#06x}")]
    ReadOnlyWrite { addr: u16 },
}

/// The five LR35902 interrupt sources, in dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptSource {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl InterruptSource {
    pub const ALL: [InterruptSource; 5] = [
        InterruptSource::VBlank,
        InterruptSource::LcdStat,
        InterruptSource::Timer,
        InterruptSource::Serial,
        InterruptSource::Joypad,
    ];

    /// Bit position of this source in IF/IE.
    pub const fn bit(self) -> u8 {
        match self {
            InterruptSource::VBlank => 0x01,
            InterruptSource::LcdStat => 0x02,
            InterruptSource::Timer => 0x04,
            InterruptSource::Serial => 0x08,
            InterruptSource::Joypad => 0x10,
        }
    }

    /// Fixed jump vector for this source.
    pub const fn vector(self) -> u16 {
        match self {
            InterruptSource::VBlank => 0x40,
            InterruptSource::LcdStat => 0x48,
            InterruptSource::Timer => 0x50,
            InterruptSource::Serial => 0x58,
            InterruptSource::Joypad => 0x60,
        }
    }

    /// Highest-priority source set in `mask` (VBlank first).
    pub fn highest_pending(mask: u8) -> Option<InterruptSource> {
        InterruptSource::ALL
            .into_iter()
            .find(|src| mask & src.bit() != 0)
    }
}

/// Memory bus and I/O register file.
///
/// Cartridge mappers, banked RAM and the full peripheral set are outside the
/// scope of this core; the map is a flat ROM image plus VRAM/WRAM/OAM/HRAM
/// and the interrupt registers. External cartridge RAM (0xA000-0xBFFF) is
/// intentionally unmapped so that bus faults are reachable.
pub struct Mmu {
    rom: Vec<u8>,
    boot_rom: Option<Vec<u8>>,
    boot_mapped: bool,
    vram: [u8; VRAM_SIZE],
    wram: [u8; WRAM_SIZE],
    oam: [u8; OAM_SIZE],
    hram: [u8; HRAM_SIZE],
    io: [u8; IO_SIZE],
    pub if_reg: u8,
    pub ie_reg: u8,
    pub gpu: Gpu,
}

impl Mmu {
    pub fn new() -> Self {
        Self {
            rom: Vec::new(),
            boot_rom: None,
            boot_mapped: false,
            vram: [0; VRAM_SIZE],
            wram: [0; WRAM_SIZE],
            oam: [0; OAM_SIZE],
            hram: [0; HRAM_SIZE],
            io: [0; IO_SIZE],
            if_reg: 0,
            ie_reg: 0,
            gpu: Gpu::new(),
        }
    }

    pub fn load_rom(&mut self, data: Vec<u8>) {
        self.rom = data;
    }

    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.boot_rom = Some(data);
        self.boot_mapped = true;
    }

    pub fn boot_mapped(&self) -> bool {
        self.boot_mapped
    }

    /// Clear all volatile state while preserving the loaded ROM images.
    pub fn reset(&mut self) {
        self.vram = [0; VRAM_SIZE];
        self.wram = [0; WRAM_SIZE];
        self.oam = [0; OAM_SIZE];
        self.hram = [0; HRAM_SIZE];
        self.io = [0; IO_SIZE];
        self.if_reg = 0;
        self.ie_reg = 0;
        self.boot_mapped = self.boot_rom.is_some();
        self.gpu.reset();
    }

    pub fn read8(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x00FF if self.boot_mapped => self
                .boot_rom
                .as_deref()
                .and_then(|boot| boot.get(addr as usize))
                .copied()
                .unwrap_or(0xFF),
            0x0000..=0x7FFF => self.rom.get(addr as usize).copied().unwrap_or(0xFF),
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],
            // External cartridge RAM is not mapped.
            0xA000..=0xBFFF => 0xFF,
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            // Echo RAM mirrors 0xC000-0xDDFF.
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            // IF upper three bits always read as 1.
            REG_IF => 0xE0 | self.if_reg,
            REG_LY => self.gpu.ly,
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize],
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
        }
    }

    /// Little-endian 16-bit read.
    pub fn read16(&self, addr: u16) -> u16 {
        let lo = self.read8(addr) as u16;
        let hi = self.read8(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write8(&mut self, addr: u16, val: u8) {
        match addr {
            // Writes into the ROM region select MBC banks on real carts;
            // mappers are out of scope, so they are ignored.
            0x0000..=0x7FFF => {}
            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = val,
            0xA000..=0xBFFF => {}
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            REG_IF => self.if_reg = val,
            REG_LY => {}
            REG_BOOT_OFF => {
                if val != 0 && self.boot_mapped {
                    self.boot_mapped = false;
                    core_info!(target: "mmu", "boot ROM unmapped");
                }
                self.io[(addr - 0xFF00) as usize] = val;
            }
            0xFF00..=0xFF7F => self.io[(addr - 0xFF00) as usize] = val,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
        }
    }

    /// Little-endian 16-bit write.
    pub fn write16(&mut self, addr: u16, val: u16) {
        self.write8(addr, val as u8);
        self.write8(addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Fallible read for speculative debugger accesses.
    pub fn try_read8(&self, addr: u16) -> Result<u8, BusFault> {
        match addr {
            0xA000..=0xBFFF | 0xFEA0..=0xFEFF => Err(BusFault::UnmappedRead { addr }),
            _ => Ok(self.read8(addr)),
        }
    }

    pub fn try_read16(&self, addr: u16) -> Result<u16, BusFault> {
        let lo = self.try_read8(addr)? as u16;
        let hi = self.try_read8(addr.wrapping_add(1))? as u16;
        Ok((hi << 8) | lo)
    }

    /// Fallible write for debugger pokes.
    pub fn try_write8(&mut self, addr: u16, val: u8) -> Result<(), BusFault> {
        match addr {
            0x0000..=0x7FFF => Err(BusFault::ReadOnlyWrite { addr }),
            0xA000..=0xBFFF | 0xFEA0..=0xFEFF => Err(BusFault::UnmappedWrite { addr }),
            _ => {
                self.write8(addr, val);
                Ok(())
            }
        }
    }

    /// Pending-and-enabled interrupt bits: `IF & IE & 0x1F`.
    pub fn interrupt_mask(&self) -> u8 {
        self.if_reg & self.ie_reg & 0x1F
    }

    pub fn request_interrupt(&mut self, src: InterruptSource) {
        self.if_reg |= src.bit();
    }

    /// Clear the IF bit for an interrupt the CPU has accepted.
    pub fn acknowledge_interrupt(&mut self, src: InterruptSource) {
        self.if_reg &= !src.bit();
    }

    /// Render the current frame and raise the VBlank interrupt (debug
    /// console's `vblank` command).
    pub fn render_and_vblank(&mut self) {
        self.gpu.render_and_vblank(&mut self.if_reg);
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wram_echo_mirrors_writes() {
        let mut mmu = Mmu::new();
        mmu.write8(0xC123, 0xAA);
        assert_eq!(mmu.read8(0xE123), 0xAA);
        mmu.write8(0xE456, 0xBB);
        assert_eq!(mmu.read8(0xC456), 0xBB);
    }

    #[test]
    fn rom_is_read_only() {
        let mut mmu = Mmu::new();
        mmu.load_rom(vec![0x12, 0x34]);
        mmu.write8(0x0000, 0xFF);
        assert_eq!(mmu.read8(0x0000), 0x12);
        assert_eq!(
            mmu.try_write8(0x0000, 0xFF),
            Err(BusFault::ReadOnlyWrite { addr: 0 })
        );
    }

    #[test]
    fn unmapped_region_is_open_bus_but_faults_on_try() {
        let mut mmu = Mmu::new();
        assert_eq!(mmu.read8(0xA000), 0xFF);
        assert_eq!(
            mmu.try_read8(0xA000),
            Err(BusFault::UnmappedRead { addr: 0xA000 })
        );
        assert_eq!(
            mmu.try_write8(0xB000, 1),
            Err(BusFault::UnmappedWrite { addr: 0xB000 })
        );
    }

    #[test]
    fn if_upper_bits_read_as_one() {
        let mut mmu = Mmu::new();
        mmu.if_reg = 0x05;
        assert_eq!(mmu.read8(0xFF0F), 0xE5);
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut mmu = Mmu::new();
        mmu.write16(0xC000, 0xBEEF);
        assert_eq!(mmu.read8(0xC000), 0xEF);
        assert_eq!(mmu.read8(0xC001), 0xBE);
        assert_eq!(mmu.read16(0xC000), 0xBEEF);
    }

    #[test]
    fn boot_rom_overlay_and_disable() {
        let mut mmu = Mmu::new();
        mmu.load_rom(vec![0xBB; 0x200]);
        mmu.load_boot_rom(vec![0xAA; 0x100]);
        assert!(mmu.boot_mapped());
        assert_eq!(mmu.read8(0x0000), 0xAA);
        assert_eq!(mmu.read8(0x0100), 0xBB);
        mmu.write8(0xFF50, 1);
        assert!(!mmu.boot_mapped());
        assert_eq!(mmu.read8(0x0000), 0xBB);
    }

    #[test]
    fn interrupt_mask_and_acknowledge() {
        let mut mmu = Mmu::new();
        mmu.ie_reg = 0x1F;
        mmu.request_interrupt(InterruptSource::Timer);
        mmu.request_interrupt(InterruptSource::Joypad);
        assert_eq!(mmu.interrupt_mask(), 0x14);
        assert_eq!(
            InterruptSource::highest_pending(mmu.interrupt_mask()),
            Some(InterruptSource::Timer)
        );
        mmu.acknowledge_interrupt(InterruptSource::Timer);
        assert_eq!(mmu.interrupt_mask(), 0x10);
    }
}
