use jvmflow::jvm::analysis::*;
use jvmflow::jvm::class_graph::{ClassData, ClassGraph};
use jvmflow::jvm::code::{BranchInstruction::*, Instruction::*, Listing, Method, MethodBuilder};
use jvmflow::jvm::*;
use std::thread;

/// Parse a listing and return all of its methods, along with their owners
fn methods(source: &str) -> Vec<(BinaryName, Method)> {
    let listing = Listing::parse(source, &BinaryName::from_str("Main").unwrap()).unwrap();
    listing
        .methods()
        .map(|(class, listed)| (class.name.clone(), listed.method.clone()))
        .collect()
}

/// Parse a listing containing a single method
fn method(source: &str) -> (BinaryName, Method) {
    let mut methods = methods(source);
    assert_eq!(methods.len(), 1, "expected exactly one method");
    methods.remove(0)
}

fn class_graph() -> ClassGraph {
    let class_graph = ClassGraph::new();
    class_graph.insert_java_library_types();
    class_graph
}

fn object(name: BinaryName) -> VerificationType {
    VerificationType::Object(RefType::Object(name))
}

const COUNT_LOOP: &str = "
.method public static count(I)I
  .limit stack 2
  .limit locals 2
    iconst_0
    istore 1
  Loop:
    iload 0
    ifle Done
    iinc 1 1
    iinc 0 -1
    goto Loop
  Done:
    iload 1
    ireturn
.end method
";

#[test]
fn loops_terminate() {
    let (owner, method) = method(COUNT_LOOP);
    let analysis = Analyzer::new(&BasicVerifier).analyze(&owner, &method).unwrap();

    assert_eq!(analysis.len(), method.instructions.len());
    assert_eq!(analysis.unreachable().count(), 0);

    // `Loop:` is reached both from the entry and from the back edge
    let loop_head = analysis.frame(2).unwrap();
    assert_eq!(loop_head.locals(), &[BasicValue::Int, BasicValue::Int]);
    assert_eq!(loop_head.stack_len(), 0);

    let returned = analysis.frame(10).unwrap();
    assert_eq!(returned.stack().collect::<Vec<_>>(), vec![&BasicValue::Int]);
}

#[test]
fn analysis_is_deterministic() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(COUNT_LOOP);

    let first = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();
    let second = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();
    assert_eq!(first.frames(), second.frames());
}

#[test]
fn merging_a_frame_into_itself_changes_nothing() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(COUNT_LOOP);
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    for frame in analysis.frames().iter().flatten() {
        let mut merged = frame.clone();
        assert_eq!(merged.merge(frame, &verifier), Ok(false));
        assert_eq!(&merged, frame);
    }
}

#[test]
fn dead_code_has_no_frames() {
    let (owner, method) = method(
        "
        .method static f()I
          .limit stack 1
          .limit locals 0
            iconst_1
            ireturn
            iconst_2
            ireturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap();

    assert!(analysis.is_reachable(0));
    assert!(analysis.is_reachable(1));
    assert!(analysis.frame(2).is_none());
    assert_eq!(analysis.unreachable().collect::<Vec<_>>(), vec![2, 3]);
}

#[test]
fn subroutines_keep_locals_of_each_call_site() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        r#"
        .method static f(Z)V
          .limit stack 1
          .limit locals 3
            iload 0
            ifeq Other
            ldc "x"
            astore 1
            jsr Sub
            aload 1
            pop
            return
          Other:
            iconst_5
            istore 1
            jsr Sub
            iload 1
            pop
            return
          Sub:
            astore 2
            ret 2
        .end method
        "#,
    );
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    // Inside the subroutine, the two call sites disagree on local 1
    let in_subroutine = analysis.frame(16).unwrap();
    assert_eq!(in_subroutine.locals()[1], VerificationType::Top);
    assert_eq!(
        analysis.frame(17).unwrap().locals()[2],
        VerificationType::ReturnAddress
    );

    // After returning, each call site gets its own local 1 back
    assert_eq!(
        analysis.frame(5).unwrap().locals()[1],
        object(BinaryName::STRING)
    );
    assert_eq!(
        analysis.frame(12).unwrap().locals()[1],
        VerificationType::Integer
    );
    assert_eq!(analysis.frame(5).unwrap().stack_len(), 0);
}

#[test]
fn stack_heights_must_agree_at_joins() {
    let (owner, method) = method(
        "
        .method static f(I)V
          .limit stack 2
          .limit locals 1
            iload 0
            ifeq Join
            iconst_1
          Join:
            return
        .end method
        ",
    );
    let error = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap_err();

    // Located at `Join:`, where the two paths meet
    assert_eq!(error.instruction, 3);
    assert!(
        matches!(
            error.kind,
            AnalysisErrorKind::IncompatibleStackHeights { .. }
        ),
        "unexpected error {:?}",
        error
    );
}

#[test]
fn computed_bounds() {
    let mut code = MethodBuilder::new(
        MethodAccessFlags::STATIC,
        UnqualifiedName::from_str("bounds").unwrap(),
        MethodDescriptor::parse("()V").unwrap(),
    );
    code.push_instruction(LConst0);
    code.push_instruction(IConst1);
    code.push_instruction(Pop);
    code.push_instruction(Pop2);
    code.push_branch_instruction(Return);
    let mut method = code.finish();

    let owner = BinaryName::from_str("Main").unwrap();
    let analysis = Analyzer::new(&BasicInterpreter)
        .analyze_and_compute_maxs(&owner, &mut method)
        .unwrap();
    assert_eq!(method.max_stack, 3);
    assert_eq!(method.max_locals, 0);
    assert_eq!(analysis.max_stack(), 3);

    // The same code doesn't fit in a smaller declared stack
    method.max_stack = 2;
    let error = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(
        error,
        AnalysisErrorKind::StackOverflow { max_stack: 2 }.at(1)
    );
}

#[test]
fn instance_methods_count_this() {
    let (owner, mut method) = method(
        "
        .class me/alec/Pair
        .method public first(JI)J
            lload 1
            lreturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&BasicInterpreter)
        .analyze_and_compute_maxs(&owner, &mut method)
        .unwrap();

    assert_eq!(method.max_locals, 4);
    assert_eq!(method.max_stack, 2);
    assert_eq!(
        analysis.initial_frame().unwrap().locals(),
        &[
            BasicValue::Reference,
            BasicValue::Long,
            BasicValue::Uninitialized,
            BasicValue::Int,
        ]
    );
}

#[test]
fn handler_frames_hold_only_the_exception() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        "
        .method static f(I)I
          .limit stack 2
          .limit locals 1
          .catch java/lang/ArithmeticException from Start to End using Handler
          Start:
            iconst_1
            iload 0
            idiv
            ireturn
          End:
          Handler:
            pop
            iconst_0
            ireturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    let handler = analysis.frame(6).unwrap();
    assert_eq!(
        handler.stack().collect::<Vec<_>>(),
        vec![&object(BinaryName::ARITHMETICEXCEPTION)]
    );
    assert_eq!(handler.locals(), &[VerificationType::Integer]);
    assert!(analysis.frame(5).is_none());
}

#[test]
fn catch_all_handlers_get_throwable() {
    let (owner, method) = method(
        "
        .method static f()V
          .limit stack 1
          .limit locals 0
          .catch any from Start to End using Handler
          Start:
            return
          End:
          Handler:
            athrow
        .end method
        ",
    );
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    assert_eq!(
        analysis.frame(4).unwrap().stack().collect::<Vec<_>>(),
        vec![&object(BinaryName::THROWABLE)]
    );
}

#[test]
fn ret_outside_subroutine() {
    let (owner, method) = method(
        "
        .method static f()V
          .limit stack 1
          .limit locals 1
            ret 0
        .end method
        ",
    );
    let error = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(error, AnalysisErrorKind::RetOutsideSubroutine.at(0));
}

#[test]
fn falling_off_the_end() {
    let (owner, method) = method(
        "
        .method static f()V
          .limit stack 1
          .limit locals 0
            iconst_0
            pop
        .end method
        ",
    );
    let error = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(error, AnalysisErrorKind::FallOffEnd.at(1));
}

#[test]
fn unresolved_classes() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        "
        .method static f(Lcom/example/Missing;)Ljava/lang/Number;
          .limit stack 1
          .limit locals 1
            aload 0
            areturn
        .end method
        ",
    );
    let error = Analyzer::new(&verifier)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(
        error,
        AnalysisErrorKind::UnresolvedClass(BinaryName::from_str("com/example/Missing").unwrap())
            .at(1)
    );

    // Once the class is known, the method verifies
    class_graph.add_class(ClassData::new(
        BinaryName::from_str("com/example/Missing").unwrap(),
        Some(BinaryName::NUMBER),
        false,
    ));
    assert!(Analyzer::new(&verifier).analyze(&owner, &method).is_ok());
}

#[test]
fn verifier_mismatches_are_located() {
    let (owner, method) = method(
        "
        .method static f(F)I
          .limit stack 2
          .limit locals 1
            fload 0
            iconst_1
            iadd
            ireturn
        .end method
        ",
    );
    let error = Analyzer::new(&BasicVerifier)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(error.instruction, 2);
    assert!(
        matches!(error.kind, AnalysisErrorKind::Mismatch { .. }),
        "unexpected error {:?}",
        error
    );

    // Without checks, the same method is fine
    assert!(Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .is_ok());
}

#[test]
fn abstract_methods_have_no_frames() {
    let (owner, method) = method(
        "
        .class public interface me/alec/Shape
        .method public abstract area()D
        .end method
        ",
    );
    let analysis = Analyzer::new(&BasicVerifier).analyze(&owner, &method).unwrap();
    assert!(analysis.is_empty());
    assert!(analysis.initial_frame().is_none());
}

#[test]
fn sources_of_values() {
    let (owner, method) = method(
        "
        .method static f(Z)I
          .limit stack 1
          .limit locals 1
            iload 0
            ifeq Zero
            iconst_1
            goto Done
          Zero:
            iconst_0
          Done:
            ireturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&SourceInterpreter)
        .analyze(&owner, &method)
        .unwrap();

    let returned = analysis.frame(7).unwrap().peek(0).unwrap();
    assert_eq!(returned.insns.iter().copied().collect::<Vec<_>>(), vec![2, 5]);
    assert_eq!(returned.size, 1);
}

#[test]
fn concurrent_analyses_share_a_class_graph() {
    let class_graph = class_graph();
    let listing = Listing::parse(
        r#"
        .class me/alec/Shape
        .method public static pick(Z)Ljava/lang/Object;
          .limit stack 1
          .limit locals 1
            iload 0
            ifeq Text
            iconst_1
            invokestatic java/lang/Integer/valueOf(I)Ljava/lang/Integer;
            areturn
          Text:
            ldc "text"
            areturn
        .end method

        .method public name()Ljava/lang/String;
          .limit stack 1
          .limit locals 1
            ldc "shape"
            areturn
        .end method
        "#,
        &BinaryName::from_str("Main").unwrap(),
    )
    .unwrap();
    for class in &listing.classes {
        class_graph.add_class(class.class.clone());
    }

    let expected: Vec<_> = listing
        .methods()
        .map(|(class, listed)| {
            Analyzer::new(&SimpleVerifier::new(&class_graph))
                .analyze(&class.name, &listed.method)
                .unwrap()
                .into_frames()
        })
        .collect();

    let found: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = listing
            .methods()
            .map(|(class, listed)| {
                let class_graph = &class_graph;
                scope.spawn(move || {
                    Analyzer::new(&SimpleVerifier::new(class_graph))
                        .analyze(&class.name, &listed.method)
                        .map(Analysis::into_frames)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    });

    assert_eq!(found, expected);
}

#[test]
fn returning_from_a_subroutine_sees_later_caller_changes() {
    let (owner, method) = method(
        "
        .method static f()V
          .limit stack 1
          .limit locals 3
            iconst_0
            istore 1
          Loop:
            jsr Sub
            iload 1
            pop
            fconst_0
            fstore 1
            jsr Sub
            goto Loop
          Sub:
            astore 2
            ret 2
        .end method
        ",
    );

    // On the second trip around the loop, local 1 holds a float when `iload 1` runs
    let error = Analyzer::new(&BasicVerifier)
        .analyze(&owner, &method)
        .unwrap_err();
    assert_eq!(error.instruction, 4);
    assert!(
        matches!(error.kind, AnalysisErrorKind::Mismatch { .. }),
        "unexpected error {:?}",
        error
    );

    let analysis = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap();
    assert_eq!(
        analysis.frame(3).unwrap().locals()[1],
        analysis.frame(4).unwrap().locals()[1]
    );
    assert_eq!(analysis.frame(4).unwrap().locals()[1], BasicValue::Uninitialized);
}

#[test]
fn nested_subroutines() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        "
        .method static f()V
          .limit stack 1
          .limit locals 4
            iconst_1
            istore 0
            jsr Outer
            iload 0
            pop
            return
          Outer:
            astore 1
            jsr Inner
            ret 1
          Inner:
            astore 2
            fconst_0
            fstore 3
            ret 2
        .end method
        ",
    );
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    // Back in the outer subroutine, its own return address survives the inner call
    let after_inner = analysis.frame(9).unwrap();
    assert_eq!(after_inner.locals()[0], VerificationType::Integer);
    assert_eq!(after_inner.locals()[1], VerificationType::ReturnAddress);
    assert_eq!(after_inner.locals()[3], VerificationType::Float);

    let after_outer = analysis.frame(3).unwrap();
    assert_eq!(after_outer.locals()[0], VerificationType::Integer);
    assert_eq!(after_outer.stack_len(), 0);
    assert_eq!(analysis.unreachable().count(), 0);
}

#[test]
fn subroutines_may_exit_without_ret() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        "
        .method static f(I)I
          .limit stack 1
          .limit locals 2
            jsr Sub
            iconst_0
            ireturn
          Sub:
            astore 1
            iload 0
            ireturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    // Nothing returns to the call site
    assert_eq!(analysis.unreachable().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(
        analysis.frame(6).unwrap().stack().collect::<Vec<_>>(),
        vec![&VerificationType::Integer]
    );
    assert_eq!(
        analysis.frame(5).unwrap().locals()[1],
        VerificationType::ReturnAddress
    );
}

#[test]
fn merging_is_idempotent() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);

    let mut frame1 = Frame::new(
        vec![VerificationType::Integer, object(BinaryName::STRING)],
        None,
        None,
    );
    frame1.push(VerificationType::Null).unwrap();
    let mut frame2 = Frame::new(
        vec![VerificationType::Float, object(BinaryName::INTEGER)],
        None,
        None,
    );
    frame2.push(object(BinaryName::STRING)).unwrap();

    let mut merged = frame1.clone();
    assert_eq!(merged.merge(&frame2, &verifier), Ok(true));
    assert_eq!(
        merged.locals(),
        &[VerificationType::Top, object(BinaryName::OBJECT)]
    );
    assert_eq!(
        merged.stack().collect::<Vec<_>>(),
        vec![&object(BinaryName::STRING)]
    );

    let mut merged_again = merged.clone();
    assert_eq!(merged_again.merge(&frame2, &verifier), Ok(false));
    assert_eq!(merged_again, merged);
    assert_eq!(merged_again.merge(&frame1, &verifier), Ok(false));
    assert_eq!(merged_again, merged);
}

#[test]
fn handlers_entered_with_a_full_stack() {
    let class_graph = class_graph();
    let verifier = SimpleVerifier::new(&class_graph);
    let (owner, method) = method(
        "
        .method static f(II)I
          .limit stack 2
          .limit locals 2
          .catch java/lang/ArithmeticException from Start to End using Handler
            iload 0
            iload 1
          Start:
            idiv
            ireturn
          End:
          Handler:
            pop
            iconst_0
            ireturn
        .end method
        ",
    );
    let analysis = Analyzer::new(&verifier).analyze(&owner, &method).unwrap();

    assert_eq!(analysis.frame(2).unwrap().stack_len(), 2);
    let handler = analysis.frame(6).unwrap();
    assert_eq!(handler.stack_slots(), 1);
    assert_eq!(
        handler.stack().collect::<Vec<_>>(),
        vec![&object(BinaryName::ARITHMETICEXCEPTION)]
    );
    assert_eq!(
        handler.locals(),
        &[VerificationType::Integer, VerificationType::Integer]
    );
}

#[test]
fn propagation_is_bounded() {
    let (owner, method) = method(
        "
        .method static f(I)V
          .limit stack 1
          .limit locals 3
            iconst_0
            istore 1
          Outer:
            iload 0
            ifle Done
            fconst_0
            fstore 1
          Inner:
            iload 0
            ifle Next
            aconst_null
            astore 2
            iinc 0 -1
            goto Inner
          Next:
            iconst_1
            istore 2
            goto Outer
          Done:
            return
        .end method
        ",
    );
    let analysis = Analyzer::new(&BasicInterpreter)
        .analyze(&owner, &method)
        .unwrap();

    // `BasicValue` has 7 values, so no frame can change more than that many times
    let reachable = analysis.len() - analysis.unreachable().count();
    assert!(analysis.instructions_processed() >= reachable);
    assert!(
        analysis.instructions_processed() <= analysis.len() * 7,
        "processed {} instructions",
        analysis.instructions_processed()
    );
    assert_eq!(
        analysis.frame(4).unwrap().locals(),
        &[
            BasicValue::Int,
            BasicValue::Uninitialized,
            BasicValue::Uninitialized
        ]
    );
}

#[test]
fn computed_locals_must_fit_a_class_file() {
    let mut code = MethodBuilder::new(
        MethodAccessFlags::STATIC,
        UnqualifiedName::from_str("wide").unwrap(),
        MethodDescriptor::parse("()V").unwrap(),
    );
    code.push_instruction(LConst0);
    code.push_instruction(LStore(u16::MAX));
    code.push_branch_instruction(Return);
    let mut method = code.finish();

    let owner = BinaryName::from_str("Main").unwrap();
    let error = Analyzer::new(&BasicInterpreter)
        .analyze_and_compute_maxs(&owner, &mut method)
        .unwrap_err();
    assert_eq!(
        error,
        AnalysisErrorKind::LimitTooLarge {
            limit: "max_locals",
            value: u16::MAX as usize + 2,
        }
        .at(1)
    );
    assert_eq!(method.max_locals, 0);
}
