use jvmflow::jvm::analysis::*;
use jvmflow::jvm::class_graph::ClassGraph;
use jvmflow::jvm::code::{Listing, Method};
use jvmflow::jvm::{AnalysisError, BinaryName, RenderDescriptor};
use jvmflow::settings::{Policy, Settings};

use clap::{crate_version, value_parser, Arg, ArgAction, Command};
use std::error::Error;
use std::{fmt, fs, process};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let matches = Command::new("jvmflow")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Runs a dataflow analysis over the methods of a JVM bytecode listing")
        .arg(
            Arg::new("policy")
                .long("policy")
                .value_name("POLICY")
                .help("Interpreter to use: basic, verify, simple, or source")
                .default_value("simple")
                .value_parser(value_parser!(Policy)),
        )
        .arg(
            Arg::new("compute maxs")
                .long("compute-maxs")
                .help("Recompute max stack and locals, even if the listing declares them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stack map")
                .long("stack-map")
                .help("Print stack map frames (simple policy only)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no frames")
                .long("no-frames")
                .help("Don't print the frame at every instruction")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("keep going")
                .long("keep-going")
                .help("Keep analyzing other methods after one fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("FILE")
                .help("Sets the listing file to analyze")
                .required(true)
                .index(1),
        )
        .get_matches();

    let mut settings = Settings::new();
    if let Some(policy) = matches.get_one::<Policy>("policy") {
        settings.policy = *policy;
    }
    settings.compute_maxs = matches.get_flag("compute maxs");
    settings.print_stack_map = matches.get_flag("stack map");
    settings.print_frames = !matches.get_flag("no frames");
    settings.keep_going = matches.get_flag("keep going");

    let file = matches
        .get_one::<String>("FILE")
        .ok_or("Missing listing file")?;
    log::info!("Reading '{}'", file);
    let source = fs::read_to_string(file)?;
    let listing = Listing::parse(&source, &settings.default_owner)?;

    let class_graph = ClassGraph::new();
    class_graph.insert_java_library_types();
    for class in &listing.classes {
        class_graph.add_class(class.class.clone());
    }

    if settings.print_stack_map && settings.policy != Policy::Simple {
        log::warn!(
            "Stack maps need the simple policy, not '{}', so none will be printed",
            settings.policy
        );
    }

    let mut failures = 0;
    for (class, listed) in listing.methods() {
        let mut method = listed.method.clone();
        let compute_maxs = settings.compute_maxs || !listed.explicit_limits;
        log::info!(
            "Analyzing {}.{}{} with the {} policy",
            class.name,
            method.name,
            method.descriptor.render(),
            settings.policy
        );

        let result = match settings.policy {
            Policy::Basic => {
                report(&BasicInterpreter, &class.name, &mut method, compute_maxs, &settings)
                    .map(drop)
            }
            Policy::Verify => {
                report(&BasicVerifier, &class.name, &mut method, compute_maxs, &settings)
                    .map(drop)
            }
            Policy::Simple => {
                let verifier = SimpleVerifier::new(&class_graph);
                report(&verifier, &class.name, &mut method, compute_maxs, &settings).and_then(
                    |analysis| {
                        if settings.print_stack_map {
                            print!("{}", StackMapTable::compute(&method, &analysis)?);
                        }
                        Ok(())
                    },
                )
            }
            Policy::Source => {
                report(&SourceInterpreter, &class.name, &mut method, compute_maxs, &settings)
                    .map(drop)
            }
        };

        if let Err(error) = result {
            failures += 1;
            eprintln!("{}.{}: {}", class.name, method.name, error);
            if !settings.keep_going {
                break;
            }
            log::warn!("Continuing past failed method {}.{}", class.name, method.name);
        }
    }

    if failures > 0 {
        log::warn!("{} method(s) failed analysis", failures);
        process::exit(1);
    }
    Ok(())
}

/// Analyze a method and print out its limits and frames
fn report<I>(
    interpreter: &I,
    owner: &BinaryName,
    method: &mut Method,
    compute_maxs: bool,
    settings: &Settings,
) -> Result<Analysis<I::Value>, AnalysisError>
where
    I: Interpreter,
    I::Value: fmt::Display,
{
    let analyzer = Analyzer::new(interpreter);
    let analysis = if compute_maxs {
        analyzer.analyze_and_compute_maxs(owner, method)?
    } else {
        analyzer.analyze(owner, method)?
    };

    println!(
        "{}.{}{} (max stack {}, max locals {})",
        owner,
        method.name,
        method.descriptor.render(),
        method.max_stack,
        method.max_locals
    );
    if settings.print_frames {
        for (index, insn) in method.instructions.iter().enumerate() {
            let frame = match analysis.frame(index) {
                Some(frame) => frame.to_string(),
                None => String::from("unreachable"),
            };
            println!("{:>4}: {:<40} {:?}", index, frame, insn);
        }
    }

    Ok(analysis)
}
