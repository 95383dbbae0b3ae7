use super::{Frame, Insn, InsnRef, Interpreter, Subroutine, Value};
use crate::jvm::code::{BranchInstruction, ExceptionHandler, InsnNode, Method, SynLabel};
use crate::jvm::{AnalysisError, AnalysisErrorKind, BinaryName, FieldType, RenderDescriptor};
use crate::util::Width;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Fixed-point dataflow analysis of method bodies
///
/// The analyzer simulates every reachable instruction of a method over the abstract values of
/// an [`Interpreter`], merging the frames flowing into each instruction until nothing changes.
/// One analyzer can be used for any number of methods, including from several threads at once
/// (each analysis owns all of its mutable state).
pub struct Analyzer<'i, I: ?Sized> {
    interpreter: &'i I,
}

impl<'i, I: Interpreter + ?Sized> Analyzer<'i, I> {
    pub fn new(interpreter: &'i I) -> Analyzer<'i, I> {
        Analyzer { interpreter }
    }

    /// Analyze a method using its declared `max_stack` and `max_locals`
    ///
    ///   * `owner` - class declaring the method (the type of `this`)
    ///   * `method` - method to analyze
    ///
    pub fn analyze(
        &self,
        owner: &BinaryName,
        method: &Method,
    ) -> Result<Analysis<I::Value>, AnalysisError> {
        self.run(
            owner,
            method,
            method.max_locals as usize,
            Some(method.max_stack as usize),
        )
    }

    /// Analyze a method, ignoring the declared `max_stack` and `max_locals` and replacing them
    /// with the values the code actually needs
    pub fn analyze_and_compute_maxs(
        &self,
        owner: &BinaryName,
        method: &mut Method,
    ) -> Result<Analysis<I::Value>, AnalysisError> {
        let max_locals = method.compute_max_locals();
        let declared_locals = u16::try_from(max_locals).map_err(|_| {
            let index = method
                .instructions
                .iter()
                .position(|insn| insn.locals_end() == Some(max_locals))
                .unwrap_or(0);
            AnalysisErrorKind::LimitTooLarge {
                limit: "max_locals",
                value: max_locals,
            }
            .at(index)
        })?;

        let analysis = self.run(owner, method, max_locals, None)?;
        let max_stack = analysis.max_stack();
        let declared_stack = u16::try_from(max_stack).map_err(|_| {
            let index = analysis
                .frames()
                .iter()
                .position(|frame| frame.as_ref().map(Frame::stack_slots) == Some(max_stack))
                .unwrap_or(0);
            AnalysisErrorKind::LimitTooLarge {
                limit: "max_stack",
                value: max_stack,
            }
            .at(index)
        })?;

        method.max_locals = declared_locals;
        method.max_stack = declared_stack;
        Ok(analysis)
    }

    fn run(
        &self,
        owner: &BinaryName,
        method: &Method,
        max_locals: usize,
        max_stack: Option<usize>,
    ) -> Result<Analysis<I::Value>, AnalysisError> {
        debug!(
            "Analyzing {}.{}{}",
            owner,
            method.name,
            method.descriptor.render()
        );

        if method.access_flags.has_no_code() {
            return Ok(Analysis {
                frames: vec![],
                initial_frame: None,
                processed: 0,
            });
        }

        let mut state = AnalysisState::new(self.interpreter, method, max_locals)?;
        state.find_subroutines()?;

        let initial_frame = self.initial_frame(owner, method, max_locals, max_stack)?;
        state.merge(0, &initial_frame, None)?;
        state.solve()?;

        let analysis = Analysis {
            frames: state.frames,
            initial_frame: Some(initial_frame),
            processed: state.processed,
        };
        debug!(
            "Finished analyzing {}.{} ({} of {} instructions reachable, {} processed)",
            owner,
            method.name,
            analysis.len() - analysis.unreachable().count(),
            analysis.len(),
            analysis.processed
        );
        Ok(analysis)
    }

    /// Frame on entry to the method: parameters in the first locals, everything else empty
    fn initial_frame(
        &self,
        owner: &BinaryName,
        method: &Method,
        max_locals: usize,
        max_stack: Option<usize>,
    ) -> Result<Frame<I::Value>, AnalysisError> {
        let interpreter = self.interpreter;
        let is_instance_method = !method.is_static();

        let mut locals = Vec::with_capacity(max_locals);
        if is_instance_method {
            let this_type = FieldType::object(owner.clone());
            locals.push(interpreter.new_parameter_value(true, 0, &this_type));
        }
        for parameter in &method.descriptor.parameters {
            let local = locals.len();
            locals.push(interpreter.new_parameter_value(is_instance_method, local, parameter));
            if parameter.width() == 2 {
                locals.push(interpreter.new_empty_value(local + 1));
            }
        }
        if locals.len() > max_locals {
            return Err(AnalysisErrorKind::InvalidLocal {
                index: max_locals,
                max_locals,
            }
            .at(0));
        }
        while locals.len() < max_locals {
            locals.push(interpreter.new_empty_value(locals.len()));
        }

        let return_value = interpreter.new_return_type_value(method.descriptor.return_type.as_ref());
        Ok(Frame::new(locals, max_stack, return_value))
    }
}

/// Mutable workspace of one analysis
struct AnalysisState<'a, I: Interpreter + ?Sized> {
    interpreter: &'a I,
    method: &'a Method,
    max_locals: usize,

    /// Branch instructions, with jump targets resolved to instruction indices
    branches: Vec<Option<BranchInstruction<usize>>>,

    /// Exception handlers covering each instruction (index of the handler, handler)
    handlers: Vec<Vec<(usize, &'a ExceptionHandler)>>,

    /// Frame before each instruction (`None` until the instruction is reached)
    frames: Vec<Option<Frame<I::Value>>>,

    /// Subroutine containing each instruction (`None` outside of subroutines)
    subroutines: Vec<Option<Subroutine>>,

    /// `ret` instructions reached so far, keyed by the start of the subroutine they return from
    rets: BTreeMap<usize, BTreeSet<usize>>,

    /// Instructions whose frame changed since they were last processed
    worklist: Vec<usize>,
    queued: Vec<bool>,

    /// Number of instructions taken off the worklist
    processed: usize,
}

impl<'a, I: Interpreter + ?Sized> AnalysisState<'a, I> {
    fn new(
        interpreter: &'a I,
        method: &'a Method,
        max_locals: usize,
    ) -> Result<AnalysisState<'a, I>, AnalysisError> {
        let label_indices = method.label_indices()?;
        let len = method.instructions.len();

        let mut branches = Vec::with_capacity(len);
        for (index, insn) in method.instructions.iter().enumerate() {
            let branch = match insn {
                InsnNode::Branch(branch) => Some(
                    branch
                        .map_labels(|label| {
                            label_indices
                                .get(label)
                                .copied()
                                .ok_or(AnalysisErrorKind::UndefinedLabel(*label))
                        })
                        .map_err(|kind| kind.at(index))?,
                ),
                _ => None,
            };
            branches.push(branch);
        }

        let mut handlers = vec![vec![]; len];
        for handler in &method.exception_handlers {
            let index_of = |label: &SynLabel| {
                label_indices
                    .get(label)
                    .copied()
                    .ok_or_else(|| AnalysisErrorKind::UndefinedLabel(*label).at(0))
            };
            let start = index_of(&handler.start)?;
            let end = index_of(&handler.end)?;
            let handler_index = index_of(&handler.handler)?;
            if end < start {
                return Err(AnalysisErrorKind::InvalidHandlerRange.at(0));
            }
            for covered in &mut handlers[start..end] {
                covered.push((handler_index, handler));
            }
        }

        Ok(AnalysisState {
            interpreter,
            method,
            max_locals,
            branches,
            handlers,
            frames: vec![None; len],
            subroutines: vec![None; len],
            rets: BTreeMap::new(),
            worklist: vec![],
            queued: vec![false; len],
            processed: 0,
        })
    }

    /// Mark every instruction with the subroutine it belongs to
    ///
    /// This also detects code where execution can run past the last instruction.
    fn find_subroutines(&mut self) -> Result<(), AnalysisError> {
        let mut jsrs: VecDeque<usize> = VecDeque::new();
        let main = Subroutine::new(None, self.max_locals, None);
        self.find_subroutine(0, &main, &mut jsrs)?;

        let mut entered: HashSet<usize> = HashSet::new();
        while let Some(jsr) = jsrs.pop_front() {
            let target = match &self.branches[jsr] {
                Some(BranchInstruction::Jsr(target)) => *target,
                _ => continue,
            };
            if entered.insert(target) {
                let subroutine = Subroutine::new(Some(target), self.max_locals, Some(jsr));
                self.find_subroutine(target, &subroutine, &mut jsrs)?;
            }
        }

        for subroutine in &mut self.subroutines {
            if matches!(subroutine, Some(Subroutine { start: None, .. })) {
                *subroutine = None;
            }
        }
        Ok(())
    }

    /// Mark all instructions reachable from `start` without going through a `jsr`
    fn find_subroutine(
        &mut self,
        start: usize,
        subroutine: &Subroutine,
        jsrs: &mut VecDeque<usize>,
    ) -> Result<(), AnalysisError> {
        // Instruction to visit, along with the instruction it is reached from
        let mut to_visit: Vec<(usize, Option<usize>)> = vec![(start, None)];

        while let Some((index, predecessor)) = to_visit.pop() {
            if index >= self.subroutines.len() {
                let location = predecessor.unwrap_or(index);
                return Err(AnalysisErrorKind::FallOffEnd.at(location));
            }
            if self.subroutines[index].is_some() {
                continue;
            }
            self.subroutines[index] = Some(subroutine.clone());

            let mut falls_through = true;
            if let Some(branch) = &self.branches[index] {
                if let BranchInstruction::Jsr(_) = branch {
                    jsrs.push_back(index);
                } else {
                    falls_through = branch.falls_through();
                    for target in branch.jump_targets().targets() {
                        to_visit.push((*target, Some(index)));
                    }
                }
            }
            for (handler, _) in &self.handlers[index] {
                to_visit.push((*handler, Some(index)));
            }
            if falls_through {
                to_visit.push((index + 1, Some(index)));
            }
        }

        Ok(())
    }

    /// Process instructions until no frame changes
    fn solve(&mut self) -> Result<(), AnalysisError> {
        while let Some(index) = self.worklist.pop() {
            self.queued[index] = false;
            self.processed += 1;
            trace!("Processing instruction {}", index);
            self.process(index)?;
        }
        Ok(())
    }

    /// Execute one instruction and propagate its frame to all of its successors
    ///
    /// Errors are located at the instruction, except for failed merges which are located at the
    /// instruction being merged into.
    fn process(&mut self, index: usize) -> Result<(), AnalysisError> {
        let at = |kind: AnalysisErrorKind| kind.at(index);
        let method = self.method;
        let interpreter = self.interpreter;
        let old_frame = match &self.frames[index] {
            Some(frame) => frame.clone(),
            None => return Ok(()),
        };
        let mut subroutine = self.subroutines[index].clone();

        match &method.instructions[index] {
            InsnNode::Label(_) | InsnNode::LineNumber(_) => {
                self.merge(index + 1, &old_frame, subroutine.as_ref())?;
            }

            InsnNode::Instruction(instruction) => {
                let mut current = old_frame.clone();
                let insn = InsnRef {
                    index,
                    insn: Insn::Instruction(instruction),
                };
                current.execute(insn, interpreter).map_err(at)?;

                if let (Some(subroutine), Some((local, width))) =
                    (&mut subroutine, instruction.local_access())
                {
                    for offset in 0..width {
                        subroutine.use_local(local as usize + offset);
                    }
                }
                self.merge(index + 1, &current, subroutine.as_ref())?;
            }

            InsnNode::Branch(branch) => {
                let mut current = old_frame.clone();
                let insn = InsnRef {
                    index,
                    insn: Insn::Branch(branch),
                };
                current.execute(insn, interpreter).map_err(at)?;

                if let (Some(subroutine), BranchInstruction::Ret(local)) = (&mut subroutine, branch)
                {
                    subroutine.use_local(*local as usize);
                }

                match self.branches[index].clone() {
                    Some(BranchInstruction::Jsr(target)) => {
                        let called = Subroutine::new(Some(target), self.max_locals, Some(index));
                        self.merge(target, &current, Some(&called))?;

                        // Locals the subroutine doesn't touch flow from here to after the `ret`,
                        // even when the subroutine's own frame didn't change
                        if let Some(rets) = self.rets.get(&target).cloned() {
                            for ret in rets {
                                self.enqueue(ret);
                            }
                        }
                    }

                    Some(BranchInstruction::Ret(_)) => {
                        let returning = subroutine
                            .as_ref()
                            .ok_or(AnalysisErrorKind::RetOutsideSubroutine)
                            .map_err(at)?;
                        if let Some(start) = returning.start {
                            self.rets.entry(start).or_default().insert(index);
                        }
                        for caller in &returning.callers {
                            let caller_frame = match &self.frames[*caller] {
                                Some(frame) => frame.clone(),
                                None => continue,
                            };
                            let mut after_ret = current.clone();
                            after_ret.merge_subroutine(&caller_frame, &returning.locals_used);
                            let caller_subroutine = self.subroutines[*caller].clone();
                            self.merge(caller + 1, &after_ret, caller_subroutine.as_ref())?;
                        }
                    }

                    Some(other) => {
                        if other.falls_through() {
                            self.merge(index + 1, &current, subroutine.as_ref())?;
                        }
                        for target in other.jump_targets().targets() {
                            self.merge(*target, &current, subroutine.as_ref())?;
                        }
                    }

                    None => (),
                }
            }
        }

        // Exceptions are thrown before the instruction has had any effect
        let handlers = self.handlers[index].clone();
        for (handler_index, handler) in handlers {
            let exception_type = handler
                .catch_type
                .clone()
                .unwrap_or(BinaryName::THROWABLE);
            let mut handler_frame = old_frame.clone();
            handler_frame.clear_stack();
            handler_frame
                .push(interpreter.new_exception_value(handler, &exception_type))
                .map_err(at)?;
            self.merge(handler_index, &handler_frame, subroutine.as_ref())?;
        }

        Ok(())
    }

    /// Merge a frame (and subroutine) into those of an instruction, queueing the instruction
    /// for processing if anything changed
    fn merge(
        &mut self,
        index: usize,
        frame: &Frame<I::Value>,
        subroutine: Option<&Subroutine>,
    ) -> Result<(), AnalysisError> {
        // Only falling through the last instruction can go out of bounds
        if index >= self.frames.len() {
            return Err(AnalysisErrorKind::FallOffEnd.at(self.frames.len().saturating_sub(1)));
        }

        let frame_changed = match &mut self.frames[index] {
            Some(old_frame) => old_frame
                .merge(frame, self.interpreter)
                .map_err(|kind| kind.at(index))?,
            empty => {
                *empty = Some(frame.clone());
                true
            }
        };

        let subroutine_changed = match (&mut self.subroutines[index], subroutine) {
            (_, None) => false,
            (Some(old_subroutine), Some(subroutine)) => old_subroutine.merge(subroutine),
            (empty, Some(subroutine)) => {
                *empty = Some(subroutine.clone());
                true
            }
        };

        if frame_changed || subroutine_changed {
            trace!("Frame at instruction {} changed", index);
            self.enqueue(index);
        }
        Ok(())
    }

    fn enqueue(&mut self, index: usize) {
        if !self.queued[index] {
            self.queued[index] = true;
            self.worklist.push(index);
        }
    }
}

/// Result of analyzing a method: the frame before every instruction
///
/// Frames are `None` for instructions that can never be reached. Abstract and native methods
/// have no frames at all.
#[derive(Debug, Clone)]
pub struct Analysis<V> {
    frames: Vec<Option<Frame<V>>>,
    initial_frame: Option<Frame<V>>,
    processed: usize,
}

impl<V: Value> Analysis<V> {
    /// Frame before an instruction, if the instruction is reachable
    pub fn frame(&self, index: usize) -> Option<&Frame<V>> {
        self.frames.get(index).and_then(Option::as_ref)
    }

    pub fn frames(&self) -> &[Option<Frame<V>>] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<Option<Frame<V>>> {
        self.frames
    }

    /// Frame on entry to the method (before any merging with loops back to the start)
    pub fn initial_frame(&self) -> Option<&Frame<V>> {
        self.initial_frame.as_ref()
    }

    pub fn is_reachable(&self, index: usize) -> bool {
        self.frame(index).is_some()
    }

    /// Indices of instructions that can never be reached
    pub fn unreachable(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_none())
            .map(|(index, _)| index)
    }

    /// Number of instructions analyzed
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// How many times an instruction was executed before reaching the fixed point
    pub fn instructions_processed(&self) -> usize {
        self.processed
    }

    /// Largest stack height (in slots) over all reachable frames
    pub fn max_stack(&self) -> usize {
        self.frames
            .iter()
            .flatten()
            .map(Frame::stack_slots)
            .max()
            .unwrap_or(0)
    }
}
