//! Per-opcode semantics, dispatched by `Cpu::step`.

use crate::cpu::{Cpu, ResolvedOperand};
use crate::encoding::Opcode;
use crate::memory::Peripheral;
use crate::trap::Status;
use crate::word::Word;

impl<P: Peripheral> Cpu<P> {
    pub(crate) fn execute(&mut self, opcode: Opcode, operands: &[ResolvedOperand]) -> Result<(), Status> {
        match opcode {
            Opcode::Nop => Ok(()),
            Opcode::Ret => self.op_ret(),
            Opcode::Cli => {
                self.flags.set(crate::flags::Flags::INTERRUPTS_ENABLED, false);
                Ok(())
            }
            Opcode::Sei => {
                self.flags.set(crate::flags::Flags::INTERRUPTS_ENABLED, true);
                Ok(())
            }

            Opcode::Jmp => {
                self.pc = self.value_of(operands[0]).as_u32() as usize;
                Ok(())
            }
            Opcode::Call => self.op_call(operands[0]),
            Opcode::Push => self.op_push(self.value_of(operands[0])),
            Opcode::Pop => self.op_pop(operands[0]),
            Opcode::Itof => self.op_itof(operands[0]),
            Opcode::Ftoi => self.op_ftoi(operands[0]),
            Opcode::Rngi => self.op_rngi(operands[0]),
            Opcode::Rngf => self.op_rngf(operands[0]),

            Opcode::Mov => self.op_mov(operands[0], operands[1]),
            Opcode::Cmpi => self.op_cmpi(operands[0], operands[1]),
            Opcode::Cmpu => self.op_cmpu(operands[0], operands[1]),
            Opcode::Cmpf => self.op_cmpf(operands[0], operands[1]),

            Opcode::Ldr => self.op_ldr(operands[0], operands[1], operands[2]),
            Opcode::Str => self.op_str(operands[0], operands[1], operands[2]),
            Opcode::Shrs => self.op_shift(operands, |a, s| (a.as_i32() >> s) as u32),
            Opcode::Shru => self.op_shift(operands, |a, s| a.as_u32() >> s),
            Opcode::Shl => self.op_shift(operands, |a, s| a.as_u32() << s),
            Opcode::And => self.op_bitwise(operands, |a, b| a & b),
            Opcode::Or => self.op_bitwise(operands, |a, b| a | b),
            Opcode::Xor => self.op_bitwise(operands, |a, b| a ^ b),
            Opcode::Not => self.op_not(operands[0], operands[1]),
            Opcode::Add => self.op_arith(operands, |a, b| a.wrapping_add(b)),
            Opcode::Sub => self.op_arith(operands, |a, b| a.wrapping_sub(b)),
            Opcode::Mul => self.op_arith(operands, |a, b| a.wrapping_mul(b)),
            Opcode::Div => self.op_div_mod(operands, i32::wrapping_div),
            Opcode::Mod => self.op_div_mod(operands, i32::wrapping_rem),
            Opcode::Addf => self.op_float(operands, |a, b| a + b),
            Opcode::Subf => self.op_float(operands, |a, b| a - b),
            Opcode::Mulf => self.op_float(operands, |a, b| a * b),
            Opcode::Divf => self.op_float(operands, |a, b| a / b),
            // Rust's `%` on floats truncates toward zero and takes the sign
            // of the dividend, e.g. `-1.5 % 1.0 == -0.5`.
            Opcode::Modf => self.op_float(operands, |a, b| a % b),

            Opcode::Ldrb | Opcode::Strb => Err(Status::MissingInstruction),
        }
    }

    fn dest_register(operand: ResolvedOperand) -> Result<u8, Status> {
        operand.as_register().ok_or(Status::BadInstruction)
    }

    /// Reads a word, latching a fault and substituting zero on failure
    /// rather than aborting the instruction — the fault surfaces at the
    /// next `cycle()` boundary, not mid-instruction.
    fn read_word_or_fault(&mut self, addr: u32) -> Word {
        match self.memory.read_word(addr) {
            Ok(value) => value,
            Err(_) => {
                self.latch_fault(Status::Segfault);
                Word::ZERO
            }
        }
    }

    /// Writes a word, latching a fault on failure rather than aborting the
    /// instruction.
    fn write_word_or_fault(&mut self, addr: u32, value: Word) {
        if self.memory.write_word(addr, value).is_err() {
            self.latch_fault(Status::Segfault);
        }
    }

    fn op_ret(&mut self) -> Result<(), Status> {
        let sp = self.registers.sp().wrapping_sub(4);
        let target = self.read_word_or_fault(sp);
        self.registers.set_sp(sp);
        self.pc = target.as_u32() as usize;
        Ok(())
    }

    fn op_call(&mut self, target: ResolvedOperand) -> Result<(), Status> {
        let sp = self.registers.sp();
        self.write_word_or_fault(sp, Word::from_bits(self.pc as u32));
        self.registers.set_sp(sp.wrapping_add(4));
        self.pc = self.value_of(target).as_u32() as usize;
        Ok(())
    }

    fn op_push(&mut self, value: Word) -> Result<(), Status> {
        let sp = self.registers.sp();
        self.write_word_or_fault(sp, value);
        self.registers.set_sp(sp.wrapping_add(4));
        Ok(())
    }

    fn op_pop(&mut self, dest: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let sp = self.registers.sp().wrapping_sub(4);
        let value = self.read_word_or_fault(sp);
        self.registers.set_sp(sp);
        self.registers.set(dest, value);
        Ok(())
    }

    fn op_itof(&mut self, dest: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let value = self.registers.get(dest).as_i32();
        self.registers.set(dest, Word::from_f32(value as f32));
        Ok(())
    }

    fn op_ftoi(&mut self, dest: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let value = self.registers.get(dest).as_f32();
        self.registers.set(dest, Word::from_i32(value.trunc() as i32));
        Ok(())
    }

    fn op_rngi(&mut self, dest: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let value = self.rng.next_i32();
        self.registers.set(dest, Word::from_i32(value));
        Ok(())
    }

    fn op_rngf(&mut self, dest: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let value = self.rng.next_f32();
        self.registers.set(dest, Word::from_f32(value));
        Ok(())
    }

    fn op_mov(&mut self, dest: ResolvedOperand, src: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        self.registers.set(dest, self.value_of(src));
        Ok(())
    }

    fn op_cmpi(&mut self, a: ResolvedOperand, b: ResolvedOperand) -> Result<(), Status> {
        let (a, b) = (self.value_of(a).as_i32(), self.value_of(b).as_i32());
        self.set_compare_flags(a == b, a > b, a < b);
        Ok(())
    }

    fn op_cmpu(&mut self, a: ResolvedOperand, b: ResolvedOperand) -> Result<(), Status> {
        let (a, b) = (self.value_of(a).as_u32(), self.value_of(b).as_u32());
        self.set_compare_flags(a == b, a > b, a < b);
        Ok(())
    }

    fn op_cmpf(&mut self, a: ResolvedOperand, b: ResolvedOperand) -> Result<(), Status> {
        let (a, b) = (self.value_of(a).as_f32(), self.value_of(b).as_f32());
        self.set_compare_flags(a == b, a > b, a < b);
        Ok(())
    }

    fn effective_address(&self, base: ResolvedOperand, offset: ResolvedOperand) -> u32 {
        let base = self.value_of(base).as_u32();
        let offset = self.value_of(offset).as_i32();
        base.wrapping_add_signed(offset)
    }

    fn op_ldr(&mut self, dest: ResolvedOperand, base: ResolvedOperand, offset: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let addr = self.effective_address(base, offset);
        let value = self.read_word_or_fault(addr);
        self.registers.set(dest, value);
        Ok(())
    }

    fn op_str(&mut self, src: ResolvedOperand, base: ResolvedOperand, offset: ResolvedOperand) -> Result<(), Status> {
        let value = self.value_of(src);
        let addr = self.effective_address(base, offset);
        self.write_word_or_fault(addr, value);
        Ok(())
    }

    fn op_shift(&mut self, operands: &[ResolvedOperand], f: impl Fn(Word, u32) -> u32) -> Result<(), Status> {
        let dest = Self::dest_register(operands[0])?;
        let src = self.value_of(operands[1]);
        let amount = self.value_of(operands[2]).as_u32() & 31;
        self.registers.set(dest, Word::from_bits(f(src, amount)));
        Ok(())
    }

    fn op_bitwise(&mut self, operands: &[ResolvedOperand], f: impl Fn(u32, u32) -> u32) -> Result<(), Status> {
        let dest = Self::dest_register(operands[0])?;
        let a = self.value_of(operands[1]).as_u32();
        let b = self.value_of(operands[2]).as_u32();
        self.registers.set(dest, Word::from_bits(f(a, b)));
        Ok(())
    }

    fn op_not(&mut self, dest: ResolvedOperand, src: ResolvedOperand) -> Result<(), Status> {
        let dest = Self::dest_register(dest)?;
        let value = self.value_of(src).as_u32();
        self.registers.set(dest, Word::from_bits(!value));
        Ok(())
    }

    fn op_arith(&mut self, operands: &[ResolvedOperand], f: impl Fn(i32, i32) -> i32) -> Result<(), Status> {
        let dest = Self::dest_register(operands[0])?;
        let a = self.value_of(operands[1]).as_i32();
        let b = self.value_of(operands[2]).as_i32();
        self.registers.set(dest, Word::from_i32(f(a, b)));
        Ok(())
    }

    /// DIV/MOD. The dividend is `operands[1]`, the divisor `operands[2]`;
    /// this traps on a zero *divisor*. (The source this was distilled from
    /// trapped on a zero dividend instead — almost certainly a bug, since
    /// that leaves an actual divide-by-zero to panic the host; see
    /// scenario 6, which divides a nonzero dividend by a zero divisor and
    /// expects the trap.)
    fn op_div_mod(&mut self, operands: &[ResolvedOperand], f: impl Fn(i32, i32) -> i32) -> Result<(), Status> {
        let dest = Self::dest_register(operands[0])?;
        let a = self.value_of(operands[1]).as_i32();
        let b = self.value_of(operands[2]).as_i32();
        if b == 0 {
            return Err(Status::DivisionByZero);
        }
        self.registers.set(dest, Word::from_i32(f(a, b)));
        Ok(())
    }

    fn op_float(&mut self, operands: &[ResolvedOperand], f: impl Fn(f32, f32) -> f32) -> Result<(), Status> {
        let dest = Self::dest_register(operands[0])?;
        let a = self.value_of(operands[1]).as_f32();
        let b = self.value_of(operands[2]).as_f32();
        self.registers.set(dest, Word::from_f32(f(a, b)));
        Ok(())
    }
}
