use super::{Insn, InsnRef, Interpreter, Value};
use crate::jvm::code::{BranchInstruction, Instruction};
use crate::jvm::AnalysisErrorKind;
use crate::util::{OffsetVec, Width};
use std::fmt;

/// State of the local variables and operand stack before an instruction executes
///
/// Locals are stored one value per slot: a `long` or `double` in local `n` is followed by an
/// "empty" value in local `n + 1`. The operand stack is stored one value per entry, and its
/// height is measured in slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<V> {
    /// Local variables in the frame
    locals: Vec<V>,

    /// Stack in the frame
    stack: OffsetVec<V>,

    /// Maximum stack height in slots (`None` for unbounded)
    max_stack: Option<usize>,

    /// Value expected by return instructions (`None` for `void` methods)
    return_value: Option<V>,
}

impl<V: Value> Frame<V> {
    /// Frame with the given locals and an empty stack
    pub fn new(locals: Vec<V>, max_stack: Option<usize>, return_value: Option<V>) -> Frame<V> {
        Frame {
            locals,
            stack: OffsetVec::new(),
            max_stack,
            return_value,
        }
    }

    pub fn locals(&self) -> &[V] {
        &self.locals
    }

    pub fn local(&self, index: usize) -> Result<&V, AnalysisErrorKind> {
        self.locals
            .get(index)
            .ok_or(AnalysisErrorKind::InvalidLocal {
                index,
                max_locals: self.locals.len(),
            })
    }

    pub fn set_local(&mut self, index: usize, value: V) -> Result<(), AnalysisErrorKind> {
        let max_locals = self.locals.len();
        match self.locals.get_mut(index) {
            Some(local) => {
                *local = value;
                Ok(())
            }
            None => Err(AnalysisErrorKind::InvalidLocal { index, max_locals }),
        }
    }

    /// Values on the stack, from bottom to top
    pub fn stack(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.stack.iter().map(|(_, _, value)| value)
    }

    /// Number of values on the stack
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Height of the stack in slots
    pub fn stack_slots(&self) -> usize {
        self.stack.offset_len().0
    }

    /// Value on the stack, counting from the top (`0` is the top value)
    pub fn peek(&self, depth: usize) -> Option<&V> {
        self.stack().rev().nth(depth)
    }

    pub fn return_value(&self) -> Option<&V> {
        self.return_value.as_ref()
    }

    pub fn push(&mut self, value: V) -> Result<(), AnalysisErrorKind> {
        if let Some(max_stack) = self.max_stack {
            if self.stack.offset_len().0 + value.width() > max_stack {
                return Err(AnalysisErrorKind::StackOverflow { max_stack });
            }
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<V, AnalysisErrorKind> {
        self.stack.pop().ok_or(AnalysisErrorKind::EmptyStack)
    }

    pub fn clear_stack(&mut self) {
        self.stack.clear();
    }

    /// Pop a value that must have a given width
    fn pop_width(&mut self, expected_width: usize) -> Result<V, AnalysisErrorKind> {
        let value = self.pop()?;
        let found_width = value.width();
        if found_width == expected_width {
            Ok(value)
        } else {
            Err(AnalysisErrorKind::InvalidWidth(found_width))
        }
    }

    /// Pop `count` values, returning them in the order they were pushed
    fn pop_many(&mut self, count: usize) -> Result<Vec<V>, AnalysisErrorKind> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.pop()?);
        }
        values.reverse();
        Ok(values)
    }

    /// Push the output of an interpreter hook that must produce a value
    fn push_produced(&mut self, value: Option<V>) -> Result<(), AnalysisErrorKind> {
        let value = value.ok_or(AnalysisErrorKind::MissingValue)?;
        self.push(value)
    }

    /// Store into a local, invalidating any 2-slot value that gets partially overwritten
    fn store<I>(&mut self, index: usize, value: V, interpreter: &I) -> Result<(), AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        let width = value.width();
        self.set_local(index, value)?;
        if width == 2 {
            self.set_local(index + 1, interpreter.new_empty_value(index + 1))?;
        }
        if index > 0 && self.local(index - 1)?.width() == 2 {
            self.set_local(index - 1, interpreter.new_empty_value(index - 1))?;
        }
        Ok(())
    }

    /// Merge another frame into this one, returning whether this frame changed
    ///
    /// Both frames must have the same stack height (in values and in slots).
    pub fn merge<I>(&mut self, other: &Frame<V>, interpreter: &I) -> Result<bool, AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        if self.stack.len() != other.stack.len()
            || self.stack.offset_len() != other.stack.offset_len()
        {
            return Err(AnalysisErrorKind::IncompatibleStackHeights {
                expected: self.stack.offset_len().0,
                found: other.stack.offset_len().0,
            });
        }

        let mut changed = false;
        for (local, other_local) in self.locals.iter_mut().zip(&other.locals) {
            let merged = interpreter.merge(local, other_local)?;
            if merged != *local {
                *local = merged;
                changed = true;
            }
        }
        for (index, (_, _, other_value)) in other.stack.iter().enumerate() {
            let merged = match self.stack.get_index(index) {
                Some((_, value)) => interpreter.merge(value, other_value)?,
                None => continue,
            };
            let unchanged = matches!(self.stack.get_index(index), Some((_, value)) if *value == merged);
            if !unchanged {
                self.stack.set_index(index, merged);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Restore the locals a subroutine did not touch from the frame at its call site
    ///
    /// `self` is the frame just after the `ret` and `caller` is the frame just before the `jsr`.
    pub fn merge_subroutine(&mut self, caller: &Frame<V>, locals_used: &[bool]) -> bool {
        let mut changed = false;
        for (index, (local, caller_local)) in
            self.locals.iter_mut().zip(&caller.locals).enumerate()
        {
            let used = locals_used.get(index).copied().unwrap_or(false);
            if !used && *local != *caller_local {
                *local = caller_local.clone();
                changed = true;
            }
        }
        changed
    }

    /// Update the frame to reflect the effects of executing an instruction
    ///
    /// Control flow is the analyzer's business: this only simulates the effect on locals and
    /// the stack.
    pub fn execute<I>(&mut self, insn: InsnRef<'_>, interpreter: &I) -> Result<(), AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        match insn.insn {
            Insn::Instruction(instruction) => {
                self.execute_instruction(insn, instruction, interpreter)
            }
            Insn::Branch(branch) => self.execute_branch(insn, branch, interpreter),
        }
    }

    fn execute_instruction<I>(
        &mut self,
        insn: InsnRef<'_>,
        instruction: &Instruction,
        interpreter: &I,
    ) -> Result<(), AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        use Instruction::*;

        match instruction {
            Nop => (),

            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | LConst0 | LConst1 | FConst0 | FConst1 | FConst2 | DConst0 | DConst1 | BiPush(_)
            | SiPush(_) | Ldc(_) | Ldc2(_) | GetStatic(_) | New(_) => {
                let value = interpreter.new_operation(insn)?;
                self.push(value)?;
            }

            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) => {
                let value = interpreter.copy_operation(insn, self.local(*idx as usize)?)?;
                self.push(value)?;
            }

            IStore(idx) | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => {
                let value = self.pop()?;
                let value = interpreter.copy_operation(insn, &value)?;
                self.store(*idx as usize, value, interpreter)?;
            }

            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad | IAdd | LAdd
            | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul | IDiv | LDiv
            | FDiv | DDiv | IRem | LRem | FRem | DRem | ISh(_) | LSh(_) | IAnd | LAnd | IOr
            | LOr | IXor | LXor | LCmp | FCmp(_) | DCmp(_) => {
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                let value = interpreter.binary_operation(insn, &value1, &value2)?;
                self.push_produced(value)?;
            }

            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                let value3 = self.pop()?;
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                interpreter.ternary_operation(insn, &value1, &value2, &value3)?;
            }

            Pop => {
                let _ = self.pop_width(1)?;
            }

            Pop2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        let _ = self.pop_width(1)?;
                    }

                    // Form 2
                    2 => (),

                    other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                }
            }

            Dup => {
                let arg1 = self.pop_width(1)?;
                let copy1 = interpreter.copy_operation(insn, &arg1)?;
                self.push(arg1)?;
                self.push(copy1)?;
            }

            DupX1 => {
                let arg1 = self.pop_width(1)?;
                let arg2 = self.pop_width(1)?;
                self.push(interpreter.copy_operation(insn, &arg1)?)?;
                self.push(arg2)?;
                self.push(arg1)?;
            }

            DupX2 => {
                let arg1 = self.pop_width(1)?;
                self.dup_x2(insn, arg1, interpreter)?;
            }

            Dup2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        let arg2 = self.pop_width(1)?;
                        let copy2 = interpreter.copy_operation(insn, &arg2)?;
                        let copy1 = interpreter.copy_operation(insn, &arg1)?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                        self.push(copy2)?;
                        self.push(copy1)?;
                    }

                    // Form 2
                    2 => {
                        let copy1 = interpreter.copy_operation(insn, &arg1)?;
                        self.push(arg1)?;
                        self.push(copy1)?;
                    }

                    other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                }
            }

            Dup2X1 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    // Form 1
                    1 => {
                        let arg2 = self.pop_width(1)?;
                        let arg3 = self.pop_width(1)?;
                        self.push(interpreter.copy_operation(insn, &arg2)?)?;
                        self.push(interpreter.copy_operation(insn, &arg1)?)?;
                        self.push(arg3)?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    // Form 2
                    2 => {
                        let arg2 = self.pop_width(1)?;
                        self.push(interpreter.copy_operation(insn, &arg1)?)?;
                        self.push(arg2)?;
                        self.push(arg1)?;
                    }

                    other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                }
            }

            Dup2X2 => {
                let arg1 = self.pop()?;
                match arg1.width() {
                    1 => {
                        let arg2 = self.pop_width(1)?;
                        let arg3 = self.pop()?;
                        match arg3.width() {
                            // Form 1
                            1 => {
                                let arg4 = self.pop_width(1)?;
                                self.push(interpreter.copy_operation(insn, &arg2)?)?;
                                self.push(interpreter.copy_operation(insn, &arg1)?)?;
                                self.push(arg4)?;
                                self.push(arg3)?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            // Form 3
                            2 => {
                                self.push(interpreter.copy_operation(insn, &arg2)?)?;
                                self.push(interpreter.copy_operation(insn, &arg1)?)?;
                                self.push(arg3)?;
                                self.push(arg2)?;
                                self.push(arg1)?;
                            }

                            other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                        }
                    }

                    // Forms 2 and 4
                    2 => self.dup_x2(insn, arg1, interpreter)?,

                    other => return Err(AnalysisErrorKind::InvalidWidth(other)),
                }
            }

            Swap => {
                let arg2 = self.pop_width(1)?;
                let arg1 = self.pop_width(1)?;
                self.push(interpreter.copy_operation(insn, &arg2)?)?;
                self.push(interpreter.copy_operation(insn, &arg1)?)?;
            }

            INeg | LNeg | FNeg | DNeg | I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I
            | D2L | D2F | I2B | I2C | I2S | GetField(_) | NewArray(_) | ANewArray(_)
            | ArrayLength | CheckCast(_) | InstanceOf(_) => {
                let value = self.pop()?;
                let value = interpreter.unary_operation(insn, &value)?;
                self.push_produced(value)?;
            }

            IInc(idx, _) => {
                let idx = *idx as usize;
                let value = interpreter.unary_operation(insn, self.local(idx)?)?;
                let value = value.ok_or(AnalysisErrorKind::MissingValue)?;
                self.set_local(idx, value)?;
            }

            PutStatic(_) | MonitorEnter | MonitorExit => {
                let value = self.pop()?;
                interpreter.unary_operation(insn, &value)?;
            }

            PutField(_) => {
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                interpreter.binary_operation(insn, &value1, &value2)?;
            }

            Invoke(invoke_type, method) => {
                let receiver = if invoke_type.has_receiver() { 1 } else { 0 };
                let values = self.pop_many(method.descriptor.parameters.len() + receiver)?;
                let value = interpreter.nary_operation(insn, &values)?;
                if method.descriptor.return_type.is_some() {
                    self.push_produced(value)?;
                }
            }

            InvokeDynamic(call_site) => {
                let values = self.pop_many(call_site.descriptor.parameters.len())?;
                let value = interpreter.nary_operation(insn, &values)?;
                if call_site.descriptor.return_type.is_some() {
                    self.push_produced(value)?;
                }
            }

            MultiANewArray(_, dimensions) => {
                let values = self.pop_many(*dimensions as usize)?;
                let value = interpreter.nary_operation(insn, &values)?;
                self.push_produced(value)?;
            }
        }

        Ok(())
    }

    /// Second half of `dup_x2` (also forms 2 and 4 of `dup2_x2`), once the top value is popped
    fn dup_x2<I>(&mut self, insn: InsnRef<'_>, arg1: V, interpreter: &I) -> Result<(), AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        let arg2 = self.pop()?;
        match arg2.width() {
            // Form 1
            1 => {
                let arg3 = self.pop_width(1)?;
                self.push(interpreter.copy_operation(insn, &arg1)?)?;
                self.push(arg3)?;
                self.push(arg2)?;
                self.push(arg1)?;
            }

            // Form 2
            2 => {
                self.push(interpreter.copy_operation(insn, &arg1)?)?;
                self.push(arg2)?;
                self.push(arg1)?;
            }

            other => return Err(AnalysisErrorKind::InvalidWidth(other)),
        }
        Ok(())
    }

    fn execute_branch<I, Lbl>(
        &mut self,
        insn: InsnRef<'_>,
        branch: &BranchInstruction<Lbl>,
        interpreter: &I,
    ) -> Result<(), AnalysisErrorKind>
    where
        I: Interpreter<Value = V> + ?Sized,
    {
        use BranchInstruction::*;

        match branch {
            If(_, _)
            | TableSwitch { .. }
            | LookupSwitch { .. }
            | AThrow
            | IfNull(_, _) => {
                let value = self.pop()?;
                interpreter.unary_operation(insn, &value)?;
            }

            IfICmp(_, _) | IfACmp(_, _) => {
                let value2 = self.pop()?;
                let value1 = self.pop()?;
                interpreter.binary_operation(insn, &value1, &value2)?;
            }

            Goto(_) | Ret(_) => (),

            Jsr(_) => {
                let value = interpreter.new_operation(insn)?;
                self.push(value)?;
            }

            IReturn | LReturn | FReturn | DReturn | AReturn => {
                let value = self.pop()?;
                interpreter.unary_operation(insn, &value)?;
                match &self.return_value {
                    Some(expected) => interpreter.return_operation(insn, &value, expected)?,
                    None => {
                        return Err(AnalysisErrorKind::IncompatibleReturn {
                            expected: String::from("void"),
                            found: format!("{:?}", value),
                        })
                    }
                }
            }

            Return => {
                if let Some(expected) = &self.return_value {
                    return Err(AnalysisErrorKind::IncompatibleReturn {
                        expected: format!("{:?}", expected),
                        found: String::from("void"),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Renders as the locals, a `|`, then the stack (bottom to top)
impl<V: Value + fmt::Display> fmt::Display for Frame<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for local in &self.locals {
            write!(f, "{} ", local)?;
        }
        f.write_str("|")?;
        for (_, _, value) in self.stack.iter() {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::analysis::{BasicInterpreter, BasicValue};
    use crate::jvm::code::{InvokeType, MethodRef};
    use crate::jvm::{BinaryName, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

    fn run(frame: &mut Frame<BasicValue>, insn: Instruction) -> Result<(), AnalysisErrorKind> {
        let insn_ref = InsnRef {
            index: 0,
            insn: Insn::Instruction(&insn),
        };
        frame.execute(insn_ref, &BasicInterpreter)
    }

    fn frame_with_stack(stack: &[BasicValue]) -> Frame<BasicValue> {
        let mut frame = Frame::new(vec![BasicValue::Uninitialized; 4], None, None);
        for value in stack {
            frame.push(value.clone()).unwrap();
        }
        frame
    }

    fn stack_of(frame: &Frame<BasicValue>) -> Vec<BasicValue> {
        frame.stack().cloned().collect()
    }

    #[test]
    fn constants_push_one_value() {
        use BasicValue::*;

        let cases = vec![
            (Instruction::AConstNull, Reference),
            (Instruction::IConstM1, Int),
            (Instruction::BiPush(3), Int),
            (Instruction::LConst1, Long),
            (Instruction::FConst2, Float),
            (Instruction::DConst0, Double),
        ];
        for (insn, expected) in cases {
            let mut frame = frame_with_stack(&[]);
            run(&mut frame, insn.clone()).unwrap();
            assert!(
                matches!(stack_of(&frame).as_slice(), [v] if *v == expected),
                "pushing a constant {:?}",
                insn
            );
        }
    }

    #[test]
    fn stack_shuffles() {
        use BasicValue::*;

        let cases = vec![
            (Instruction::Dup, vec![Int], vec![Int, Int]),
            (Instruction::DupX1, vec![Float, Int], vec![Int, Float, Int]),
            (Instruction::DupX2, vec![Long, Int], vec![Int, Long, Int]),
            (Instruction::DupX2, vec![Float, Reference, Int], vec![Int, Float, Reference, Int]),
            (Instruction::Dup2, vec![Float, Int], vec![Float, Int, Float, Int]),
            (Instruction::Dup2, vec![Double], vec![Double, Double]),
            (Instruction::Dup2X1, vec![Float, Reference, Int], vec![Reference, Int, Float, Reference, Int]),
            (Instruction::Dup2X1, vec![Int, Long], vec![Long, Int, Long]),
            (Instruction::Dup2X2, vec![Long, Double], vec![Double, Long, Double]),
            (Instruction::Dup2X2, vec![Long, Int, Float], vec![Int, Float, Long, Int, Float]),
            (Instruction::Dup2X2, vec![Int, Float, Double], vec![Double, Int, Float, Double]),
            (Instruction::Swap, vec![Int, Float], vec![Float, Int]),
            (Instruction::Pop2, vec![Int, Float], vec![]),
            (Instruction::Pop2, vec![Int, Long], vec![Int]),
        ];
        for (insn, before, after) in cases {
            let mut frame = frame_with_stack(&before);
            run(&mut frame, insn.clone()).unwrap();
            assert_eq!(stack_of(&frame), after, "executing {:?} on {:?}", insn, before);
        }
    }

    #[test]
    fn illegal_shuffles() {
        use BasicValue::*;

        let cases = vec![
            (Instruction::Pop, vec![Long]),
            (Instruction::Pop2, vec![Long, Int]),
            (Instruction::Dup, vec![Double]),
            (Instruction::DupX1, vec![Long, Int]),
            (Instruction::Swap, vec![Int, Long]),
            (Instruction::Dup2X1, vec![Long, Long]),
        ];
        for (insn, before) in cases {
            let mut frame = frame_with_stack(&before);
            let result = run(&mut frame, insn.clone());
            assert!(
                matches!(result, Err(AnalysisErrorKind::InvalidWidth(_))),
                "executing {:?} on {:?}: {:?}",
                insn,
                before,
                result
            );
        }

        let mut frame = frame_with_stack(&[]);
        assert_eq!(run(&mut frame, Instruction::Pop), Err(AnalysisErrorKind::EmptyStack));
    }

    #[test]
    fn wide_stores_invalidate_neighbours() {
        use BasicValue::*;

        let mut frame = frame_with_stack(&[Long]);
        run(&mut frame, Instruction::LStore(1)).unwrap();
        assert_eq!(frame.locals(), &[Uninitialized, Long, Uninitialized, Uninitialized]);

        // Overwriting the second half of the long invalidates the first half
        frame.push(Int).unwrap();
        run(&mut frame, Instruction::IStore(2)).unwrap();
        assert_eq!(frame.locals(), &[Uninitialized, Uninitialized, Int, Uninitialized]);

        frame.push(Double).unwrap();
        assert_eq!(
            run(&mut frame, Instruction::DStore(3)),
            Err(AnalysisErrorKind::InvalidLocal {
                index: 4,
                max_locals: 4
            })
        );
    }

    #[test]
    fn stack_overflow_counts_slots() {
        let mut frame: Frame<BasicValue> = Frame::new(vec![], Some(3), None);
        run(&mut frame, Instruction::LConst0).unwrap();
        run(&mut frame, Instruction::IConst0).unwrap();
        assert_eq!(frame.stack_slots(), 3);
        assert_eq!(
            run(&mut frame, Instruction::IConst0),
            Err(AnalysisErrorKind::StackOverflow { max_stack: 3 })
        );
    }

    #[test]
    fn invocations_pop_receiver_and_arguments() {
        use BasicValue::*;

        let method = MethodRef {
            class: BinaryName::STRING,
            name: UnqualifiedName::from_str("substring").unwrap(),
            descriptor: MethodDescriptor::parse("(IJ)Ljava/lang/String;").unwrap(),
            is_interface: false,
        };

        let mut frame = frame_with_stack(&[Float, Reference, Int, Long]);
        run(&mut frame, Instruction::Invoke(InvokeType::Virtual, method.clone())).unwrap();
        assert_eq!(stack_of(&frame), vec![Float, Reference]);

        let mut frame = frame_with_stack(&[Float, Int, Long]);
        run(&mut frame, Instruction::Invoke(InvokeType::Static, method)).unwrap();
        assert_eq!(stack_of(&frame), vec![Float, Reference]);
    }

    #[test]
    fn merging_frames() {
        use BasicValue::*;

        let mut frame1 = Frame::new(vec![Int, Float], None, None);
        frame1.push(Int).unwrap();
        let mut frame2 = Frame::new(vec![Int, Int], None, None);
        frame2.push(Int).unwrap();

        assert_eq!(frame1.merge(&frame2, &BasicInterpreter), Ok(true));
        assert_eq!(frame1.locals(), &[Int, Uninitialized]);
        assert_eq!(frame1.merge(&frame2, &BasicInterpreter), Ok(false));

        frame2.push(Int).unwrap();
        assert_eq!(
            frame1.merge(&frame2, &BasicInterpreter),
            Err(AnalysisErrorKind::IncompatibleStackHeights {
                expected: 1,
                found: 2
            })
        );

        let mut frame3 = Frame::new(vec![Int, Int], None, None);
        frame3.push(Long).unwrap();
        assert!(frame1.merge(&frame3, &BasicInterpreter).is_err());
    }

    #[test]
    fn returns() {
        let mut frame: Frame<BasicValue> =
            Frame::new(vec![], None, Some(BasicValue::Int));
        let ret = BranchInstruction::Return;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Branch(&ret),
        };
        assert!(matches!(
            frame.execute(insn, &BasicInterpreter),
            Err(AnalysisErrorKind::IncompatibleReturn { .. })
        ));

        frame.push(BasicValue::Int).unwrap();
        let ret = BranchInstruction::IReturn;
        let insn = InsnRef {
            index: 0,
            insn: Insn::Branch(&ret),
        };
        assert_eq!(frame.execute(insn, &BasicInterpreter), Ok(()));
    }

    #[test]
    fn display() {
        let mut frame: Frame<BasicValue> = Frame::new(
            vec![BasicValue::Int, BasicValue::Long, BasicValue::Uninitialized],
            None,
            None,
        );
        assert_eq!(frame.to_string(), "I J . |");

        frame.push(BasicValue::Reference).unwrap();
        frame.push(BasicValue::Double).unwrap();
        assert_eq!(frame.to_string(), "I J . | R D");
    }
}
