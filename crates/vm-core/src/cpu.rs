//! Register file, flags, pending-interrupt queue, and the fetch/decode/
//! execute loop.

use crate::encoding::{self, Arity, Condition, RawOperand};
use crate::flags::Flags;
use crate::interrupts::InterruptQueue;
use crate::memory::{Memory, Peripheral};
use crate::observable::{Observable, Value};
use crate::registers::Registers;
use crate::rng::VmRng;
use crate::trap::Status;
use crate::word::Word;

/// One operand after register-or-immediate resolution, with any extension
/// word already folded in and sign-extension already applied.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ResolvedOperand {
    Register(u8),
    Immediate(Word),
}

impl ResolvedOperand {
    pub(crate) fn as_register(self) -> Option<u8> {
        match self {
            Self::Register(r) => Some(r),
            Self::Immediate(_) => None,
        }
    }
}

pub struct Cpu<P: Peripheral> {
    pub(crate) registers: Registers,
    pub(crate) pc: usize,
    pub(crate) flags: Flags,
    pending: InterruptQueue,
    latched_fault: Option<Status>,
    instructions: Vec<Word>,
    pub(crate) memory: Memory<P>,
    pub(crate) rng: VmRng,
    last_status: Status,
}

impl<P: Peripheral> Cpu<P> {
    #[must_use]
    pub fn new(memory: Memory<P>) -> Self {
        Self {
            registers: Registers::new(),
            pc: 0,
            flags: Flags::reset_value(),
            pending: InterruptQueue::new(),
            latched_fault: None,
            instructions: Vec::new(),
            memory,
            rng: VmRng::default(),
            last_status: Status::Undefined,
        }
    }

    /// Replaces the default RNG with one seeded for reproducible tests.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = VmRng::from_seed(seed);
        self
    }

    /// Returns the CPU to its post-construction state: registers, memory,
    /// code, and flags wiped, pending queue drained.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.memory.reset();
        self.instructions.clear();
        self.flags = Flags::reset_value();
        self.pending.clear();
        self.pc = 0;
        self.latched_fault = None;
        self.last_status = Status::Undefined;
    }

    /// Installs an assembled program: the word stream, the initial data
    /// image, SP at `data.len()`, and sets READY.
    pub fn load(&mut self, instructions: Vec<Word>, data: &[u8]) {
        self.memory.load_data(data);
        self.instructions = instructions;
        self.registers.set_sp(data.len() as u32);
        self.pc = 0;
        self.flags.set(Flags::READY, true);
    }

    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Overrides the fetch cursor. Assembled images call this after `load`
    /// to start at the `main` symbol instead of word-stream index 0.
    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
    }

    /// The word at the current fetch cursor, if any, without advancing it.
    /// Lets a caller describe the next instruction before executing it —
    /// the runner's verbose trace uses this with `encoding::describe`.
    #[must_use]
    pub fn peek_instruction(&self) -> Option<Word> {
        self.instructions.get(self.pc).copied()
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.last_status.is_trap()
    }

    /// Enqueues an interrupt target. Returns `false` (no state change) if
    /// the CPU hasn't been loaded yet or the queue is full.
    pub fn interrupt(&mut self, target: u32) -> bool {
        if !self.flags.contains(Flags::READY) {
            return false;
        }
        self.pending.push(target)
    }

    /// Records a fault discovered mid-instruction. The instruction that
    /// discovered it still completes (with a caller-chosen substitute
    /// value); the trap itself is reported at the next `cycle()` boundary.
    pub(crate) fn latch_fault(&mut self, status: Status) {
        self.latched_fault = Some(status);
    }

    /// Runs up to `budget` instructions, stopping earlier on trap or
    /// out-of-instructions. Returns the terminal status and whether the
    /// full budget was consumed without hitting one.
    pub fn cycle(&mut self, budget: u32) -> (Status, bool) {
        for _ in 0..budget {
            if let Some(fault) = self.latched_fault.take() {
                self.last_status = fault;
                return (fault, false);
            }
            self.service_interrupt();
            if let Some(fault) = self.latched_fault.take() {
                self.last_status = fault;
                return (fault, false);
            }
            if let Err(status) = self.step() {
                self.last_status = status;
                return (status, false);
            }
        }
        self.last_status = Status::Success;
        (Status::Success, true)
    }

    fn service_interrupt(&mut self) {
        if !self.flags.contains(Flags::INTERRUPTS_ENABLED) || self.pending.is_empty() {
            return;
        }
        let Some(target) = self.pending.pop() else {
            return;
        };
        let sp = self.registers.sp();
        match self.memory.write_word(sp, Word::from_bits(self.pc as u32)) {
            Ok(()) => {
                self.registers.set_sp(sp.wrapping_add(4));
                self.pc = target as usize;
            }
            Err(_) => self.latched_fault = Some(Status::Segfault),
        }
    }

    fn step(&mut self) -> Result<(), Status> {
        if self.pc >= self.instructions.len() {
            return Err(Status::OutOfInstructions);
        }
        let word = self.instructions[self.pc];
        self.pc += 1;

        // Peek at the widest arity to read condition/opcode; the real
        // operand decode re-runs with the opcode's own arity, since a
        // missing operand earlier in the word changes how later bits read.
        let probe = encoding::decode(word, Arity::Three);
        let Some(opcode) = probe.opcode else {
            return Err(Status::MissingInstruction);
        };
        let Some(condition) = probe.condition else {
            return Err(Status::BadInstruction);
        };

        let arity = opcode.arity().count();
        let decoded = encoding::decode(word, opcode.arity());
        let mut operands = [ResolvedOperand::Register(0); 3];
        for (slot, raw) in decoded.operands[..arity].iter().enumerate() {
            operands[slot] = self.resolve_operand(raw)?;
        }

        if !self.condition_holds(condition) {
            return Ok(());
        }

        self.execute(opcode, &operands[..arity])
    }

    fn resolve_operand(&mut self, raw: &RawOperand) -> Result<ResolvedOperand, Status> {
        match *raw {
            RawOperand::Register(r) => Ok(ResolvedOperand::Register(r)),
            RawOperand::Immediate { raw: bits, width } => {
                let mask = encoding::mask_for_width(width);
                if bits == mask {
                    if self.pc >= self.instructions.len() {
                        return Err(Status::OutOfInstructions);
                    }
                    let extension = self.instructions[self.pc];
                    self.pc += 1;
                    Ok(ResolvedOperand::Immediate(extension))
                } else {
                    Ok(ResolvedOperand::Immediate(encoding::sign_extend(bits, width)))
                }
            }
        }
    }

    fn condition_holds(&self, condition: Condition) -> bool {
        match condition {
            Condition::Al => true,
            Condition::Eq => self.flags.contains(Flags::EQUAL),
            Condition::Ne => !self.flags.contains(Flags::EQUAL),
            Condition::Gt => self.flags.contains(Flags::GREATER_THAN),
            Condition::Lt => self.flags.contains(Flags::LESS_THAN),
            Condition::Ge => self.flags.any(Flags::GREATER_THAN | Flags::EQUAL),
            Condition::Le => self.flags.any(Flags::LESS_THAN | Flags::EQUAL),
        }
    }

    pub(crate) fn value_of(&self, operand: ResolvedOperand) -> Word {
        match operand {
            ResolvedOperand::Register(r) => self.registers.get(r),
            ResolvedOperand::Immediate(w) => w,
        }
    }

    pub(crate) fn set_compare_flags(&mut self, equal: bool, greater: bool, less: bool) {
        self.flags.set(Flags::EQUAL, equal);
        self.flags.set(Flags::GREATER_THAN, greater);
        self.flags.set(Flags::LESS_THAN, less);
    }
}

impl<P: Peripheral> Observable for Cpu<P> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(index) = path.strip_prefix('r').and_then(|s| s.parse::<u8>().ok()) {
            if index < encoding::NUM_REGISTERS {
                return Some(Value::Word(self.registers.get(index).bits()));
            }
        }
        match path {
            "pc" => Some(Value::Word(self.pc as u32)),
            "sp" => Some(Value::Word(self.registers.sp())),
            "bp" => Some(Value::Word(self.registers.bp())),
            "flags" => Some(Value::Word(self.flags.bits())),
            "interrupts_enabled" => Some(Value::Bool(self.flags.contains(Flags::INTERRUPTS_ENABLED))),
            "ready" => Some(Value::Bool(self.flags.contains(Flags::READY))),
            "status" => Some(Value::Status(self.last_status)),
            _ => None,
        }
    }

    fn query_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = (0..encoding::NUM_REGISTERS).map(|i| format!("r{i}")).collect();
        paths.extend(
            ["pc", "sp", "bp", "flags", "interrupts_enabled", "ready", "status"]
                .iter()
                .map(|s| (*s).to_string()),
        );
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConfig, NullPeripheral};

    fn blank_cpu() -> Cpu<NullPeripheral> {
        Cpu::new(Memory::new(
            MemoryConfig { size: 256, peripheral_base: 0x8000_0000 },
            NullPeripheral,
        ))
    }

    #[test]
    fn reset_clears_registers_flags_and_queue() {
        let mut cpu = blank_cpu();
        cpu.load(vec![Word::ZERO], &[]);
        cpu.registers.set(3, Word::from_i32(-5));
        cpu.interrupt(4);
        cpu.reset();
        assert_eq!(cpu.registers.get(3).as_i32(), 0);
        assert_eq!(cpu.flags.bits(), Flags::reset_value().bits());
        assert!(!cpu.interrupt(4)); // READY cleared again by reset
    }

    #[test]
    fn out_of_instructions_when_pc_runs_past_the_stream() {
        let mut cpu = blank_cpu();
        cpu.load(vec![], &[]);
        let (status, completed) = cpu.cycle(1);
        assert_eq!(status, Status::OutOfInstructions);
        assert!(!completed);
    }
}
