//! Textual listings of classes and their methods
//!
//! The format is a small dialect of Jasmin assembly:
//!
//! ```text
//! .class me/alec/Counter
//! .super java/lang/Object
//!
//! .method public static count(I)I
//!   .limit stack 2
//!   .limit locals 2
//!     iconst_0
//!     istore 1
//!   Loop:
//!     iload 0
//!     ifle Done
//!     iinc 1 1
//!     iinc 0 -1
//!     goto Loop
//!   Done:
//!     iload 1
//!     ireturn
//! .end method
//! ```
//!
//! Comments start with a `;` at the start of a line or after whitespace (so the `;` ending an
//! object descriptor is not a comment). Methods declared outside of any `.class` belong to a
//! default owner class.

use super::{
    BranchInstruction, CompareMode, Constant, EqComparison, FieldRef, Instruction,
    InvokeDynamicRef, InvokeType, Method, MethodBuilder, MethodRef, OrdComparison, ShiftType,
    SynLabel,
};
use crate::jvm::class_graph::ClassData;
use crate::jvm::{
    BaseType, BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
    RefType, UnqualifiedName,
};
use std::collections::HashMap;
use std::fmt;

/// Everything declared in a listing
#[derive(Debug)]
pub struct Listing {
    pub classes: Vec<ClassListing>,
}

/// Class declared in a listing
#[derive(Debug)]
pub struct ClassListing {
    pub class: ClassData,
    pub methods: Vec<MethodListing>,
}

#[derive(Debug)]
pub struct MethodListing {
    pub method: Method,

    /// Were both `.limit stack` and `.limit locals` given?
    ///
    /// If not, the limits on `method` are placeholders that should be computed.
    pub explicit_limits: bool,
}

/// Malformed listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingError {
    /// Line number (starting from 1)
    pub line: usize,

    pub message: String,
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ListingError {}

impl Listing {
    /// Parse a listing
    ///
    /// Methods outside of any `.class` are put in a class named `default_owner`.
    pub fn parse(source: &str, default_owner: &BinaryName) -> Result<Listing, ListingError> {
        let mut parser = ListingParser {
            classes: vec![],
            method: None,
        };
        let mut last_line = 0;
        for (line_idx, line) in source.lines().enumerate() {
            last_line = line_idx + 1;
            parser
                .parse_line(strip_comment(line), default_owner)
                .map_err(|message| ListingError {
                    line: last_line,
                    message,
                })?;
        }
        if let Some(method) = &parser.method {
            return Err(ListingError {
                line: last_line,
                message: format!("Method '{}' is missing `.end method`", method.name),
            });
        }
        Ok(Listing {
            classes: parser.classes,
        })
    }

    /// Iterate through all methods, along with their owning class
    pub fn methods(&self) -> impl Iterator<Item = (&ClassData, &MethodListing)> {
        self.classes
            .iter()
            .flat_map(|class| class.methods.iter().map(move |m| (&class.class, m)))
    }
}

struct ListingParser {
    classes: Vec<ClassListing>,
    method: Option<MethodInProgress>,
}

struct MethodInProgress {
    name: UnqualifiedName,
    builder: MethodBuilder,
    labels: HashMap<String, SynLabel>,
    max_stack: Option<u16>,
    max_locals: Option<u16>,
}

impl MethodInProgress {
    fn label(&mut self, name: &str) -> Result<SynLabel, String> {
        if name.is_empty() || name.contains(':') {
            return Err(format!("Invalid label name '{}'", name));
        }
        if let Some(label) = self.labels.get(name) {
            return Ok(*label);
        }
        let label = self.builder.fresh_label();
        self.labels.insert(name.to_owned(), label);
        Ok(label)
    }

    fn finish(self) -> MethodListing {
        let MethodInProgress {
            builder,
            max_stack,
            max_locals,
            ..
        } = self;
        let mut method = builder.finish();
        let explicit_limits = max_stack.is_some() && max_locals.is_some();
        method.max_stack = max_stack.unwrap_or(0);
        method.max_locals = match max_locals {
            Some(max_locals) => max_locals,
            None => u16::try_from(method.compute_max_locals()).unwrap_or(u16::MAX),
        };
        MethodListing {
            method,
            explicit_limits,
        }
    }
}

impl ListingParser {
    fn current_class(&mut self, default_owner: &BinaryName) -> &mut ClassListing {
        if self.classes.is_empty() {
            self.classes.push(ClassListing {
                class: ClassData::new(default_owner.clone(), Some(BinaryName::OBJECT), false),
                methods: vec![],
            });
        }
        let last = self.classes.len() - 1;
        &mut self.classes[last]
    }

    fn parse_line(&mut self, line: &str, default_owner: &BinaryName) -> Result<(), String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        if line.starts_with('.') {
            return self.parse_directive(line, default_owner);
        }

        let method = self
            .method
            .as_mut()
            .ok_or_else(|| String::from("Instruction outside of a method"))?;

        // Leading label
        let mut rest = line;
        let first = line.split_whitespace().next().unwrap_or("");
        if let Some(label_name) = first.strip_suffix(':') {
            let label = method.label(label_name)?;
            method.builder.place_label(label);
            rest = line[first.len()..].trim_start();
            if rest.is_empty() {
                return Ok(());
            }
        }

        parse_instruction(method, rest)
    }

    fn parse_directive(&mut self, line: &str, default_owner: &BinaryName) -> Result<(), String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            ".class" | ".interface" => {
                self.end_class_check()?;
                let (name, modifiers) = tokens[1..]
                    .split_last()
                    .ok_or_else(|| format!("Missing class name for `{}`", tokens[0]))?;
                let is_interface =
                    tokens[0] == ".interface" || modifiers.iter().any(|m| *m == "interface");
                let name = parse_binary_name(name)?;
                let superclass = if name == BinaryName::OBJECT {
                    None
                } else {
                    Some(BinaryName::OBJECT)
                };
                self.classes.push(ClassListing {
                    class: ClassData::new(name, superclass, is_interface),
                    methods: vec![],
                });
            }
            ".super" => {
                self.end_class_check()?;
                let name = parse_binary_name(expect_args(&tokens, 1)?[0])?;
                self.current_class(default_owner).class.superclass = Some(name);
            }
            ".implements" => {
                self.end_class_check()?;
                let name = parse_binary_name(expect_args(&tokens, 1)?[0])?;
                self.current_class(default_owner).class.interfaces.push(name);
            }
            ".method" => {
                self.end_class_check()?;
                let (signature, modifiers) = tokens[1..]
                    .split_last()
                    .ok_or_else(|| String::from("Missing method name and descriptor"))?;
                let mut access_flags = MethodAccessFlags::empty();
                for modifier in modifiers {
                    access_flags |= MethodAccessFlags::from_keyword(modifier)
                        .ok_or_else(|| format!("Unknown method modifier '{}'", modifier))?;
                }
                let (name, descriptor) = split_member(signature)?;
                let descriptor = parse_method_descriptor(descriptor)?;
                let name = parse_unqualified_name(name)?;
                self.method = Some(MethodInProgress {
                    name: name.clone(),
                    builder: MethodBuilder::new(access_flags, name, descriptor),
                    labels: HashMap::new(),
                    max_stack: None,
                    max_locals: None,
                });
            }
            ".limit" => {
                let args = expect_args(&tokens, 2)?;
                let method = self.method_mut(".limit")?;
                let limit = parse_number::<u16>(args[1])?;
                match args[0] {
                    "stack" => method.max_stack = Some(limit),
                    "locals" => method.max_locals = Some(limit),
                    other => return Err(format!("Unknown limit '{}'", other)),
                }
            }
            ".catch" => {
                let args = expect_args(&tokens, 7)?;
                if args[1] != "from" || args[3] != "to" || args[5] != "using" {
                    return Err(String::from(
                        "Expected `.catch TYPE from START to END using HANDLER`",
                    ));
                }
                let catch_type = match args[0] {
                    "any" | "all" => None,
                    class => Some(parse_binary_name(class)?),
                };
                let method = self.method_mut(".catch")?;
                let start = method.label(args[2])?;
                let end = method.label(args[4])?;
                let handler = method.label(args[6])?;
                method
                    .builder
                    .add_exception_handler(start, end, handler, catch_type);
            }
            ".line" => {
                let args = expect_args(&tokens, 1)?;
                let line = parse_number::<u16>(args[0])?;
                self.method_mut(".line")?.builder.line_number(line);
            }
            ".end" => {
                let args = expect_args(&tokens, 1)?;
                match args[0] {
                    "method" => {
                        let method = self
                            .method
                            .take()
                            .ok_or_else(|| String::from("`.end method` outside of a method"))?;
                        let method = method.finish();
                        self.current_class(default_owner).methods.push(method);
                    }
                    "class" => self.end_class_check()?,
                    other => return Err(format!("Unknown `.end {}`", other)),
                }
            }
            other => return Err(format!("Unknown directive '{}'", other)),
        }
        Ok(())
    }

    fn method_mut(&mut self, directive: &str) -> Result<&mut MethodInProgress, String> {
        self.method
            .as_mut()
            .ok_or_else(|| format!("`{}` outside of a method", directive))
    }

    fn end_class_check(&self) -> Result<(), String> {
        match &self.method {
            Some(method) => Err(format!(
                "Method '{}' is missing `.end method`",
                method.name
            )),
            None => Ok(()),
        }
    }
}

/// Remove a trailing comment
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    let mut previous = ' ';
    for (idx, c) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == ';' && previous.is_whitespace() {
            return &line[..idx];
        }
        previous = c;
    }
    line
}

fn expect_args<'a, 'b>(tokens: &'b [&'a str], count: usize) -> Result<&'b [&'a str], String> {
    let args = &tokens[1..];
    if args.len() == count {
        Ok(args)
    } else {
        Err(format!(
            "`{}` expects {} argument(s), but got {}",
            tokens[0],
            count,
            args.len()
        ))
    }
}

fn parse_number<N: std::str::FromStr>(token: &str) -> Result<N, String> {
    token
        .parse::<N>()
        .map_err(|_| format!("Invalid number '{}'", token))
}

fn parse_binary_name(token: &str) -> Result<BinaryName, String> {
    BinaryName::from_str(token)
}

fn parse_unqualified_name(token: &str) -> Result<UnqualifiedName, String> {
    UnqualifiedName::from_str(token)
}

fn parse_method_descriptor(token: &str) -> Result<MethodDescriptor<BinaryName>, String> {
    MethodDescriptor::parse(token)
        .map_err(|err| format!("Invalid method descriptor '{}': {}", token, err))
}

fn parse_field_type(token: &str) -> Result<FieldType<BinaryName>, String> {
    FieldType::parse(token).map_err(|err| format!("Invalid field type '{}': {}", token, err))
}

/// Class operand: either a binary name or an array descriptor
fn parse_class_operand(token: &str) -> Result<RefType<BinaryName>, String> {
    if token.starts_with('[') {
        RefType::parse(token).map_err(|err| format!("Invalid array type '{}': {}", token, err))
    } else {
        parse_binary_name(token).map(RefType::Object)
    }
}

/// Split `name(desc)` into `name` and `(desc)`
fn split_member(token: &str) -> Result<(&str, &str), String> {
    match token.find('(') {
        Some(idx) => Ok((&token[..idx], &token[idx..])),
        None => Err(format!("Expected a method descriptor in '{}'", token)),
    }
}

/// Split `owner/name` into owner and name
fn split_owner(token: &str) -> Result<(BinaryName, UnqualifiedName), String> {
    match token.rsplit_once('/') {
        Some((owner, name)) => Ok((parse_binary_name(owner)?, parse_unqualified_name(name)?)),
        None => Err(format!("Expected `owner/name`, but found '{}'", token)),
    }
}

/// Parse `owner/name(desc)` into a method reference
fn parse_method_ref(token: &str, is_interface: bool) -> Result<MethodRef, String> {
    let (owner_and_name, descriptor) = split_member(token)?;
    let (class, name) = split_owner(owner_and_name)?;
    Ok(MethodRef {
        class,
        name,
        descriptor: parse_method_descriptor(descriptor)?,
        is_interface,
    })
}

fn parse_field_ref(args: &[&str]) -> Result<FieldRef, String> {
    match args {
        [owner_and_name, descriptor] => {
            let (class, name) = split_owner(owner_and_name)?;
            Ok(FieldRef {
                class,
                name,
                descriptor: parse_field_type(descriptor)?,
            })
        }
        _ => Err(String::from("Expected `owner/name DESCRIPTOR`")),
    }
}

fn parse_base_type(token: &str) -> Result<BaseType, String> {
    Ok(match token {
        "boolean" => BaseType::Boolean,
        "byte" => BaseType::Byte,
        "char" => BaseType::Char,
        "short" => BaseType::Short,
        "int" => BaseType::Int,
        "long" => BaseType::Long,
        "float" => BaseType::Float,
        "double" => BaseType::Double,
        other => return Err(format!("Unknown primitive type '{}'", other)),
    })
}

fn parse_string_literal(token: &str) -> Result<String, String> {
    let inner = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| format!("Unterminated string literal {}", token))?;
    let mut string = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            string.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => string.push('\n'),
            Some('t') => string.push('\t'),
            Some('r') => string.push('\r'),
            Some('"') => string.push('"'),
            Some('\\') => string.push('\\'),
            Some(other) => return Err(format!("Unknown escape '\\{}'", other)),
            None => return Err(String::from("Dangling escape at end of string")),
        }
    }
    Ok(string)
}

/// Operand of `ldc`
fn parse_constant(operand: &str) -> Result<Constant, String> {
    if operand.starts_with('"') {
        return parse_string_literal(operand).map(Constant::String);
    }
    let (keyword, rest) = match operand.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (operand, ""),
    };
    match keyword {
        "class" => parse_class_operand(rest).map(Constant::Class),
        "methodtype" => parse_method_descriptor(rest).map(Constant::MethodType),
        "methodhandle" => parse_method_ref(rest, false).map(Constant::MethodHandle),
        _ if !rest.is_empty() => Err(format!("Invalid constant '{}'", operand)),
        number => {
            if let Ok(int) = number.parse::<i32>() {
                return Ok(Constant::Integer(int));
            }
            let float = number
                .strip_suffix(|c: char| c == 'f' || c == 'F')
                .unwrap_or(number);
            float
                .parse::<f32>()
                .map(Constant::Float)
                .map_err(|_| format!("Invalid constant '{}'", operand))
        }
    }
}

/// Operand of `ldc2_w`
fn parse_wide_constant(operand: &str) -> Result<Constant, String> {
    if let Some(long) = operand.strip_suffix(|c: char| c == 'l' || c == 'L') {
        return parse_number::<i64>(long).map(Constant::Long);
    }
    if let Some(double) = operand.strip_suffix(|c: char| c == 'd' || c == 'D') {
        return parse_number::<f64>(double).map(Constant::Double);
    }
    if let Ok(long) = operand.parse::<i64>() {
        return Ok(Constant::Long(long));
    }
    parse_number::<f64>(operand).map(Constant::Double)
}

fn parse_instruction(method: &mut MethodInProgress, line: &str) -> Result<(), String> {
    use BranchInstruction as B;
    use Instruction::*;

    let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
        Some((mnemonic, rest)) => (mnemonic, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let no_args = |insn: Instruction| -> Result<Instruction, String> {
        if args.is_empty() {
            Ok(insn)
        } else {
            Err(format!("`{}` takes no arguments", mnemonic))
        }
    };
    let one_arg = || -> Result<&str, String> {
        match args.as_slice() {
            [arg] => Ok(*arg),
            _ => Err(format!("`{}` takes exactly one argument", mnemonic)),
        }
    };
    let local = || -> Result<u16, String> { one_arg().and_then(parse_number::<u16>) };

    // Short forms like `iload_0` or `astore_3`
    if let Some((family, n)) = mnemonic.rsplit_once('_') {
        let short_local = match n {
            "0" => Some(0),
            "1" => Some(1),
            "2" => Some(2),
            "3" => Some(3),
            _ => None,
        };
        let short_insn = short_local.and_then(|n| match family {
            "iload" => Some(ILoad(n)),
            "lload" => Some(LLoad(n)),
            "fload" => Some(FLoad(n)),
            "dload" => Some(DLoad(n)),
            "aload" => Some(ALoad(n)),
            "istore" => Some(IStore(n)),
            "lstore" => Some(LStore(n)),
            "fstore" => Some(FStore(n)),
            "dstore" => Some(DStore(n)),
            "astore" => Some(AStore(n)),
            _ => None,
        });
        if let Some(insn) = short_insn {
            method.builder.push_instruction(no_args(insn)?);
            return Ok(());
        }
    }

    let insn = match mnemonic {
        "nop" => no_args(Nop)?,
        "aconst_null" => no_args(AConstNull)?,
        "iconst_m1" => no_args(IConstM1)?,
        "iconst_0" => no_args(IConst0)?,
        "iconst_1" => no_args(IConst1)?,
        "iconst_2" => no_args(IConst2)?,
        "iconst_3" => no_args(IConst3)?,
        "iconst_4" => no_args(IConst4)?,
        "iconst_5" => no_args(IConst5)?,
        "lconst_0" => no_args(LConst0)?,
        "lconst_1" => no_args(LConst1)?,
        "fconst_0" => no_args(FConst0)?,
        "fconst_1" => no_args(FConst1)?,
        "fconst_2" => no_args(FConst2)?,
        "dconst_0" => no_args(DConst0)?,
        "dconst_1" => no_args(DConst1)?,
        "bipush" => BiPush(one_arg().and_then(parse_number::<i8>)?),
        "sipush" => SiPush(one_arg().and_then(parse_number::<i16>)?),
        "ldc" | "ldc_w" => Ldc(parse_constant(rest)?),
        "ldc2_w" => Ldc2(parse_wide_constant(one_arg()?)?),
        "iload" => ILoad(local()?),
        "lload" => LLoad(local()?),
        "fload" => FLoad(local()?),
        "dload" => DLoad(local()?),
        "aload" => ALoad(local()?),
        "iaload" => no_args(IALoad)?,
        "laload" => no_args(LALoad)?,
        "faload" => no_args(FALoad)?,
        "daload" => no_args(DALoad)?,
        "aaload" => no_args(AALoad)?,
        "baload" => no_args(BALoad)?,
        "caload" => no_args(CALoad)?,
        "saload" => no_args(SALoad)?,
        "istore" => IStore(local()?),
        "lstore" => LStore(local()?),
        "fstore" => FStore(local()?),
        "dstore" => DStore(local()?),
        "astore" => AStore(local()?),
        "iastore" => no_args(IAStore)?,
        "lastore" => no_args(LAStore)?,
        "fastore" => no_args(FAStore)?,
        "dastore" => no_args(DAStore)?,
        "aastore" => no_args(AAStore)?,
        "bastore" => no_args(BAStore)?,
        "castore" => no_args(CAStore)?,
        "sastore" => no_args(SAStore)?,
        "pop" => no_args(Pop)?,
        "pop2" => no_args(Pop2)?,
        "dup" => no_args(Dup)?,
        "dup_x1" => no_args(DupX1)?,
        "dup_x2" => no_args(DupX2)?,
        "dup2" => no_args(Dup2)?,
        "dup2_x1" => no_args(Dup2X1)?,
        "dup2_x2" => no_args(Dup2X2)?,
        "swap" => no_args(Swap)?,
        "iadd" => no_args(IAdd)?,
        "ladd" => no_args(LAdd)?,
        "fadd" => no_args(FAdd)?,
        "dadd" => no_args(DAdd)?,
        "isub" => no_args(ISub)?,
        "lsub" => no_args(LSub)?,
        "fsub" => no_args(FSub)?,
        "dsub" => no_args(DSub)?,
        "imul" => no_args(IMul)?,
        "lmul" => no_args(LMul)?,
        "fmul" => no_args(FMul)?,
        "dmul" => no_args(DMul)?,
        "idiv" => no_args(IDiv)?,
        "ldiv" => no_args(LDiv)?,
        "fdiv" => no_args(FDiv)?,
        "ddiv" => no_args(DDiv)?,
        "irem" => no_args(IRem)?,
        "lrem" => no_args(LRem)?,
        "frem" => no_args(FRem)?,
        "drem" => no_args(DRem)?,
        "ineg" => no_args(INeg)?,
        "lneg" => no_args(LNeg)?,
        "fneg" => no_args(FNeg)?,
        "dneg" => no_args(DNeg)?,
        "ishl" => no_args(ISh(ShiftType::Left))?,
        "ishr" => no_args(ISh(ShiftType::ArithmeticRight))?,
        "iushr" => no_args(ISh(ShiftType::LogicalRight))?,
        "lshl" => no_args(LSh(ShiftType::Left))?,
        "lshr" => no_args(LSh(ShiftType::ArithmeticRight))?,
        "lushr" => no_args(LSh(ShiftType::LogicalRight))?,
        "iand" => no_args(IAnd)?,
        "land" => no_args(LAnd)?,
        "ior" => no_args(IOr)?,
        "lor" => no_args(LOr)?,
        "ixor" => no_args(IXor)?,
        "lxor" => no_args(LXor)?,
        "iinc" => match args.as_slice() {
            [idx, delta] => IInc(parse_number(idx)?, parse_number(delta)?),
            _ => return Err(String::from("`iinc` expects a local and an increment")),
        },
        "i2l" => no_args(I2L)?,
        "i2f" => no_args(I2F)?,
        "i2d" => no_args(I2D)?,
        "l2i" => no_args(L2I)?,
        "l2f" => no_args(L2F)?,
        "l2d" => no_args(L2D)?,
        "f2i" => no_args(F2I)?,
        "f2l" => no_args(F2L)?,
        "f2d" => no_args(F2D)?,
        "d2i" => no_args(D2I)?,
        "d2l" => no_args(D2L)?,
        "d2f" => no_args(D2F)?,
        "i2b" => no_args(I2B)?,
        "i2c" => no_args(I2C)?,
        "i2s" => no_args(I2S)?,
        "lcmp" => no_args(LCmp)?,
        "fcmpl" => no_args(FCmp(CompareMode::L))?,
        "fcmpg" => no_args(FCmp(CompareMode::G))?,
        "dcmpl" => no_args(DCmp(CompareMode::L))?,
        "dcmpg" => no_args(DCmp(CompareMode::G))?,
        "getstatic" => GetStatic(parse_field_ref(&args)?),
        "putstatic" => PutStatic(parse_field_ref(&args)?),
        "getfield" => GetField(parse_field_ref(&args)?),
        "putfield" => PutField(parse_field_ref(&args)?),
        "invokevirtual" | "invokespecial" | "invokestatic" | "invokeinterface" => {
            let invoke_type = match mnemonic {
                "invokevirtual" => InvokeType::Virtual,
                "invokespecial" => InvokeType::Special,
                "invokestatic" => InvokeType::Static,
                _ => InvokeType::Interface,
            };
            let (target, is_interface) = match (invoke_type, args.as_slice()) {
                (InvokeType::Interface, [target]) => (*target, true),
                (InvokeType::Interface, [target, count]) => {
                    parse_number::<u8>(count)?;
                    (*target, true)
                }
                (_, [target]) => (*target, false),
                (_, [target, "interface"]) => (*target, true),
                _ => return Err(format!("Malformed `{}`", mnemonic)),
            };
            Invoke(invoke_type, parse_method_ref(target, is_interface)?)
        }
        "invokedynamic" => {
            let (name, descriptor) = split_member(one_arg()?)?;
            InvokeDynamic(InvokeDynamicRef {
                name: parse_unqualified_name(name)?,
                descriptor: parse_method_descriptor(descriptor)?,
            })
        }
        "new" => New(parse_binary_name(one_arg()?)?),
        "newarray" => NewArray(parse_base_type(one_arg()?)?),
        "anewarray" => ANewArray(parse_class_operand(one_arg()?)?),
        "arraylength" => no_args(ArrayLength)?,
        "checkcast" => CheckCast(parse_class_operand(one_arg()?)?),
        "instanceof" => InstanceOf(parse_class_operand(one_arg()?)?),
        "monitorenter" => no_args(MonitorEnter)?,
        "monitorexit" => no_args(MonitorExit)?,
        "multianewarray" => match args.as_slice() {
            [descriptor, dimensions] => {
                MultiANewArray(parse_class_operand(descriptor)?, parse_number(dimensions)?)
            }
            _ => return Err(String::from("`multianewarray` expects a type and dimensions")),
        },

        // Everything else is a branch
        _ => {
            let branch = parse_branch(method, mnemonic, &args)?;
            method.builder.push_branch_instruction(branch);
            return Ok(());
        }
    };
    method.builder.push_instruction(insn);
    Ok(())
}

fn parse_branch(
    method: &mut MethodInProgress,
    mnemonic: &str,
    args: &[&str],
) -> Result<BranchInstruction<SynLabel>, String> {
    use BranchInstruction::*;


    let branch = match mnemonic {
        "ifeq" => If(OrdComparison::EQ, single_label(method, mnemonic, args)?),
        "ifne" => If(OrdComparison::NE, single_label(method, mnemonic, args)?),
        "iflt" => If(OrdComparison::LT, single_label(method, mnemonic, args)?),
        "ifge" => If(OrdComparison::GE, single_label(method, mnemonic, args)?),
        "ifgt" => If(OrdComparison::GT, single_label(method, mnemonic, args)?),
        "ifle" => If(OrdComparison::LE, single_label(method, mnemonic, args)?),
        "if_icmpeq" => IfICmp(OrdComparison::EQ, single_label(method, mnemonic, args)?),
        "if_icmpne" => IfICmp(OrdComparison::NE, single_label(method, mnemonic, args)?),
        "if_icmplt" => IfICmp(OrdComparison::LT, single_label(method, mnemonic, args)?),
        "if_icmpge" => IfICmp(OrdComparison::GE, single_label(method, mnemonic, args)?),
        "if_icmpgt" => IfICmp(OrdComparison::GT, single_label(method, mnemonic, args)?),
        "if_icmple" => IfICmp(OrdComparison::LE, single_label(method, mnemonic, args)?),
        "if_acmpeq" => IfACmp(EqComparison::EQ, single_label(method, mnemonic, args)?),
        "if_acmpne" => IfACmp(EqComparison::NE, single_label(method, mnemonic, args)?),
        "ifnull" => IfNull(EqComparison::EQ, single_label(method, mnemonic, args)?),
        "ifnonnull" => IfNull(EqComparison::NE, single_label(method, mnemonic, args)?),
        "goto" | "goto_w" => Goto(single_label(method, mnemonic, args)?),
        "jsr" | "jsr_w" => Jsr(single_label(method, mnemonic, args)?),
        "ret" => match args {
            [idx] => Ret(parse_number(idx)?),
            _ => return Err(String::from("`ret` expects a local")),
        },
        "ireturn" | "lreturn" | "freturn" | "dreturn" | "areturn" | "return" | "athrow"
            if !args.is_empty() =>
        {
            return Err(format!("`{}` takes no arguments", mnemonic))
        }
        "ireturn" => IReturn,
        "lreturn" => LReturn,
        "freturn" => FReturn,
        "dreturn" => DReturn,
        "areturn" => AReturn,
        "return" => Return,
        "athrow" => AThrow,
        "tableswitch" => {
            let (labels, default) = split_switch_default(args)?;
            let (low, labels) = labels
                .split_first()
                .ok_or_else(|| String::from("`tableswitch` is missing its low value"))?;
            TableSwitch {
                default: method.label(default)?,
                low: parse_number(low)?,
                targets: labels
                    .iter()
                    .map(|label| method.label(label))
                    .collect::<Result<_, _>>()?,
            }
        }
        "lookupswitch" => {
            let (pairs, default) = split_switch_default(args)?;
            let mut targets = vec![];
            for pair in pairs {
                let (key, label) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("Expected `key:label`, but found '{}'", pair))?;
                targets.push((parse_number::<i32>(key)?, method.label(label)?));
            }
            targets.sort_by_key(|(key, _)| *key);
            if targets.windows(2).any(|pair| pair[0].0 == pair[1].0) {
                return Err(String::from("Duplicate key in `lookupswitch`"));
            }
            LookupSwitch {
                default: method.label(default)?,
                targets,
            }
        }
        other => return Err(format!("Unknown instruction '{}'", other)),
    };
    Ok(branch)
}

fn single_label(
    method: &mut MethodInProgress,
    mnemonic: &str,
    args: &[&str],
) -> Result<SynLabel, String> {
    match args {
        [label] => method.label(label),
        _ => Err(format!("`{}` expects a single label", mnemonic)),
    }
}

/// Split `... default LABEL` into the leading arguments and the default label
fn split_switch_default<'a, 'b>(args: &'b [&'a str]) -> Result<(&'b [&'a str], &'a str), String> {
    match args {
        [leading @ .., "default", default] => Ok((leading, *default)),
        _ => Err(String::from("Switch is missing `default LABEL`")),
    }
}
