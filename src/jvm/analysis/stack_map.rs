use super::{Analysis, Frame, VerificationType};
use crate::jvm::code::{InsnNode, Method};
use crate::jvm::AnalysisError;
use crate::util::Width;
use std::collections::BTreeSet;
use std::fmt;

/// Stack map frames a method needs, one at every instruction that can be jumped to
///
/// Only reachable targets get a frame. Frames are kept in instruction order, with each one
/// encoded relative to the one before it (the first being relative to the method's initial
/// frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapTable(pub Vec<StackMapEntry>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapEntry {
    /// Index of the instruction (usually a label) the frame describes
    pub index: usize,
    pub frame: StackMapFrame,
}

/// Frame in a stack map, relative to the previous frame
///
/// In all of these, locals are listed one entry per value (so a `long` or `double` takes a
/// single entry) and trailing `Top` locals are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame {
    /// Same locals as the previous frame and an empty stack
    Same,

    /// Same locals as the previous frame and exactly one value on the stack
    SameLocalsOneStack(VerificationType),

    /// The previous frame's locals, minus the last 1 to 3 of them, and an empty stack
    Chop(u8),

    /// The previous frame's locals plus 1 to 3 more, and an empty stack
    Append(Vec<VerificationType>),

    Full {
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    },
}

impl StackMapTable {
    /// Compute the stack map of a method from the result of verifying it
    pub fn compute(
        method: &Method,
        analysis: &Analysis<VerificationType>,
    ) -> Result<StackMapTable, AnalysisError> {
        let label_indices = method.label_indices()?;

        // Instructions that are jumped to, switched to, or that start handlers
        let mut targets = BTreeSet::new();
        for insn in &method.instructions {
            if let InsnNode::Branch(branch) = insn {
                let jump_targets = branch.jump_targets();
                targets.extend(
                    jump_targets
                        .targets()
                        .iter()
                        .filter_map(|label| label_indices.get(label).copied()),
                );
            }
        }
        targets.extend(
            method
                .exception_handlers
                .iter()
                .filter_map(|handler| label_indices.get(&handler.handler).copied()),
        );

        let mut previous_locals = match analysis.initial_frame() {
            Some(initial_frame) => compressed_locals(initial_frame),
            None => return Ok(StackMapTable(vec![])),
        };

        let mut entries = vec![];
        for index in targets {
            let frame = match analysis.frame(index) {
                Some(frame) => frame,
                None => continue,
            };
            let locals = compressed_locals(frame);
            let stack: Vec<VerificationType> = frame.stack().cloned().collect();
            entries.push(StackMapEntry {
                index,
                frame: StackMapFrame::relative_to(&previous_locals, locals.clone(), stack),
            });
            previous_locals = locals;
        }

        Ok(StackMapTable(entries))
    }
}

impl StackMapFrame {
    /// Pick the most compact encoding of a frame given the locals of the previous frame
    ///
    /// This only uses `Full` if none of the other variants are enough to encode the transition.
    fn relative_to(
        previous_locals: &[VerificationType],
        locals: Vec<VerificationType>,
        stack: Vec<VerificationType>,
    ) -> StackMapFrame {
        match stack.as_slice() {
            [] => {
                if locals.len() <= previous_locals.len() {
                    let len_difference = previous_locals.len() - locals.len();
                    if len_difference < 4 && previous_locals.starts_with(&locals) {
                        return if len_difference == 0 {
                            StackMapFrame::Same
                        } else {
                            StackMapFrame::Chop(len_difference as u8)
                        };
                    }
                } else if locals.len() - previous_locals.len() < 4
                    && locals.starts_with(previous_locals)
                {
                    return StackMapFrame::Append(locals[previous_locals.len()..].to_vec());
                }
            }
            [value] if locals == previous_locals => {
                return StackMapFrame::SameLocalsOneStack(value.clone());
            }
            _ => (),
        }

        StackMapFrame::Full { locals, stack }
    }
}

/// Locals with one entry per value and trailing unusable locals removed
fn compressed_locals(frame: &Frame<VerificationType>) -> Vec<VerificationType> {
    let mut locals = vec![];
    let mut all_locals = frame.locals().iter();
    while let Some(local) = all_locals.next() {
        locals.push(local.clone());
        if local.width() == 2 {
            all_locals.next();
        }
    }
    while locals.last() == Some(&VerificationType::Top) {
        locals.pop();
    }
    locals
}

fn write_types(f: &mut fmt::Formatter<'_>, types: &[VerificationType]) -> fmt::Result {
    f.write_str("[")?;
    for (i, typ) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", typ)?;
    }
    f.write_str("]")
}

impl fmt::Display for StackMapFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackMapFrame::Same => f.write_str("same"),
            StackMapFrame::SameLocalsOneStack(value) => {
                write!(f, "same_locals_1_stack_item {}", value)
            }
            StackMapFrame::Chop(chopped) => write!(f, "chop {}", chopped),
            StackMapFrame::Append(locals) => {
                f.write_str("append ")?;
                write_types(f, locals)
            }
            StackMapFrame::Full { locals, stack } => {
                f.write_str("full locals ")?;
                write_types(f, locals)?;
                f.write_str(" stack ")?;
                write_types(f, stack)
            }
        }
    }
}

impl fmt::Display for StackMapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.0 {
            writeln!(f, "{:>4}: {}", entry.index, entry.frame)?;
        }
        Ok(())
    }
}
