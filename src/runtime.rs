use crate::environment::Environment;
use crate::error::{runtime_error, type_mismatch, Result};
use crate::module::{canonical_path, load_module, resolve_module_path, FALLBACK_DIR};
use crate::parser::{BinaryOp, Expr, Node};
use crate::pipeline::RunOptions;
use crate::stdlib::create_standard_env;
use crate::tokenizer::{Number, Token, TokenType};
use log::{debug, trace};
use std::{
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

#[derive(Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Boolean(_) => "bool",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Value::String(s) = self {
            write!(f, "\"{}\"", s)
        } else {
            write!(f, "{}", self)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

pub type BuiltIn = Rc<dyn Fn(Vec<Value>) -> std::result::Result<Option<Value>, String>>;

/// A host-provided function. Returns `None` when the call produces no value.
#[derive(Clone)]
pub struct Callable {
    pub name: String,
    pub arity: Arity,
    pub func: BuiltIn,
}

impl Callable {
    pub fn call(&self, arguments: Vec<Value>, token: &Token) -> Result<Option<Value>> {
        if let Arity::Exact(arity) = self.arity {
            if arity != arguments.len() {
                return runtime_error(
                    format!(
                        "Expected {} arguments but got {}",
                        arity,
                        arguments.len()
                    ),
                    token,
                );
            }
        }

        (self.func)(arguments).or_else(|message| runtime_error(message, token))
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in {}>", self.name)
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

pub fn evaluate(expr: &Expr, env: &Environment) -> Result<Value> {
    match expr {
        Expr::Value(token) => evaluate_value(token, env),
        Expr::Binary {
            left,
            operator,
            token,
            right,
        } => {
            let left_val = evaluate(left, env)?;
            let right_val = evaluate(right, env)?;
            evaluate_binary(*operator, left_val, right_val, token)
        }
        Expr::Call { name, arguments } => match call_function(name, arguments, env)? {
            Some(value) => Ok(value),
            None => runtime_error(
                format!("function '{}' does not return a value", name.literal),
                name,
            ),
        },
    }
}

pub fn call_function(name: &Token, arguments: &[Expr], env: &Environment) -> Result<Option<Value>> {
    let Some(callable) = env.function(&name.literal) else {
        let message = if env.variable(&name.literal).is_some() {
            format!("'{}' is a variable, not a function", name.literal)
        } else {
            format!("unknown function '{}'", name.literal)
        };
        return runtime_error(message, name);
    };

    let mut evaluated_args = Vec::with_capacity(arguments.len());
    for arg in arguments {
        evaluated_args.push(evaluate(arg, env)?);
    }

    callable.call(evaluated_args, name)
}

fn evaluate_value(token: &Token, env: &Environment) -> Result<Value> {
    match &token.token_type {
        TokenType::String(s) => Ok(Value::String(s.clone())),
        TokenType::Number(Number::Int(n)) => Ok(Value::Int(*n)),
        TokenType::Number(Number::Float(n)) => Ok(Value::Float(*n)),
        TokenType::True => Ok(Value::Boolean(true)),
        TokenType::False => Ok(Value::Boolean(false)),
        TokenType::Identifier(name) => match env.variable(name) {
            Some(value) => Ok(value.clone()),
            None if env.function(name).is_some() => {
                runtime_error(format!("'{}' is a function, not a variable", name), token)
            }
            None => runtime_error(format!("unknown variable '{}'", name), token),
        },
        _ => runtime_error(format!("expected value, found {}", token.describe()), token),
    }
}

fn checked(result: Option<i64>, token: &Token) -> Result<Value> {
    match result {
        Some(n) => Ok(Value::Int(n)),
        None => runtime_error("integer overflow", token),
    }
}

// A negative count yields the empty string. The buffer is reserved up front
// so an oversized result is an error instead of an allocation abort.
fn repeat_string(s: &str, n: i64, token: &Token) -> Result<Value> {
    let count = usize::try_from(n).unwrap_or(0);
    if s.is_empty() || count == 0 {
        return Ok(Value::String(String::new()));
    }

    let mut repeated = String::new();
    let reserved = s
        .len()
        .checked_mul(count)
        .map(|len| repeated.try_reserve_exact(len).is_ok());
    if reserved != Some(true) {
        return runtime_error("string repetition overflow", token);
    }

    (0..count).for_each(|_| repeated.push_str(s));
    Ok(Value::String(repeated))
}

fn evaluate_binary(operator: BinaryOp, left: Value, right: Value, token: &Token) -> Result<Value> {
    match (operator, &left, &right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(*b), token),
        (BinaryOp::Add, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),

        (BinaryOp::Subtract, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(*b), token),
        (BinaryOp::Subtract, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),

        (BinaryOp::Multiply, Value::String(s), Value::Int(n)) => repeat_string(s, *n, token),
        (BinaryOp::Multiply, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(*b), token),
        (BinaryOp::Multiply, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),

        (BinaryOp::Divide, Value::Int(_), Value::Int(0)) => runtime_error("Division by zero", token),
        (BinaryOp::Divide, Value::Int(a), Value::Int(b)) => checked(a.checked_div(*b), token),
        (BinaryOp::Divide, Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),

        (BinaryOp::Modulo, Value::Int(_), Value::Int(0)) => runtime_error("Modulo by zero", token),
        (BinaryOp::Modulo, Value::Int(a), Value::Int(b)) => checked(a.checked_rem(*b), token),

        (BinaryOp::Equal, _, _) => Ok(Value::Boolean(left == right)),
        (BinaryOp::NotEqual, _, _) => Ok(Value::Boolean(left != right)),

        (BinaryOp::Greater, Value::Int(a), Value::Int(b)) => Ok(Value::Boolean(a > b)),
        (BinaryOp::Greater, Value::Float(a), Value::Float(b)) => Ok(Value::Boolean(a > b)),
        (BinaryOp::Less, Value::Int(a), Value::Int(b)) => Ok(Value::Boolean(a < b)),
        (BinaryOp::Less, Value::Float(a), Value::Float(b)) => Ok(Value::Boolean(a < b)),

        (BinaryOp::And, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(*a && *b)),
        (BinaryOp::Or, Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(*a || *b)),

        _ => type_mismatch(
            format!(
                "cannot apply {} to {} and {}",
                token.describe(),
                left.type_name(),
                right.type_name()
            ),
            token,
        ),
    }
}

/// Position of every label in a statement sequence, computed once before
/// execution. A position is a path: the index in the outer sequence, then
/// for each enclosing conditional the arm number and the index inside it.
#[derive(Debug, Default)]
pub struct LabelTable {
    targets: HashMap<String, Vec<usize>>,
}

impl LabelTable {
    pub fn index(nodes: &[Node]) -> Result<Self> {
        let mut table = LabelTable::default();
        table.collect(nodes, &mut Vec::new())?;
        debug!("indexed {} labels", table.targets.len());
        Ok(table)
    }

    fn collect(&mut self, nodes: &[Node], path: &mut Vec<usize>) -> Result<()> {
        for (index, node) in nodes.iter().enumerate() {
            path.push(index);

            match node {
                Node::Label { name } => {
                    if self.targets.contains_key(&name.literal) {
                        return runtime_error(
                            format!(
                                "cannot create label '{}' as it already exists",
                                name.literal
                            ),
                            name,
                        );
                    }
                    self.targets.insert(name.literal.clone(), path.clone());
                }
                Node::If { .. } => {
                    let mut arm = 0;
                    while let Some(body) = node.branch_body(arm) {
                        path.push(arm);
                        self.collect(body, path)?;
                        path.pop();
                        arm += 1;
                    }
                }
                _ => (),
            }

            path.pop();
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[usize]> {
        self.targets.get(name).map(Vec::as_slice)
    }
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Jump(Vec<usize>),
}

/// Executes statement sequences against one environment.
pub struct Interpreter<'a> {
    env: Environment,
    file: PathBuf,
    options: &'a RunOptions,
    imports: Vec<PathBuf>,
    dump: Box<dyn Write + 'a>,
}

impl<'a> Interpreter<'a> {
    pub fn new(file: &Path, options: &'a RunOptions) -> Self {
        Self {
            env: create_standard_env(),
            file: file.to_path_buf(),
            options,
            imports: Vec::new(),
            dump: Box::new(io::stdout()),
        }
    }

    /// Where the per-statement variable dumps go; stdout by default.
    pub fn with_dump(mut self, dump: Box<dyn Write + 'a>) -> Self {
        self.dump = dump;
        self
    }

    /// Files whose execution is waiting on this one, outermost first.
    pub fn with_imports(mut self, imports: Vec<PathBuf>) -> Self {
        self.imports = imports;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn restore(&mut self, env: Environment) {
        self.env = env;
    }

    pub fn into_environment(self) -> Environment {
        self.env
    }

    pub fn execute(&mut self, nodes: &[Node]) -> Result<()> {
        let labels = LabelTable::index(nodes)?;

        let mut entry = Vec::new();
        while let Flow::Jump(target) = self.execute_block(nodes, &labels, &entry)? {
            entry = target;
        }
        Ok(())
    }

    // Run `nodes` from the position `entry` (empty means the start). Jumps are
    // handed back to `execute`, which restarts from the label's position.
    fn execute_block(&mut self, nodes: &[Node], labels: &LabelTable, entry: &[usize]) -> Result<Flow> {
        let (mut ip, mut descend) = match entry.split_first() {
            Some((ip, rest)) => (*ip, rest.split_first()),
            None => (0, None),
        };

        while ip < nodes.len() {
            let flow = match descend.take() {
                Some((arm, rest)) => match nodes[ip].branch_body(*arm) {
                    Some(body) => self.execute_block(body, labels, rest)?,
                    None => Flow::Continue,
                },
                None => self.execute_node(&nodes[ip], labels)?,
            };

            // A jump raised inside a conditional was already dumped there.
            let nested = matches!(nodes[ip], Node::If { .. });
            if self.options.print_vars_each_cycle && !(nested && flow != Flow::Continue) {
                writeln!(self.dump, "{}", self.env)?;
            }

            if let Flow::Jump(target) = flow {
                return Ok(Flow::Jump(target));
            }
            ip += 1;
        }

        Ok(Flow::Continue)
    }

    fn execute_node(&mut self, node: &Node, labels: &LabelTable) -> Result<Flow> {
        let token = node.token();
        trace!("{}:{} {}", token.line, token.column, token.describe());

        match node {
            Node::Assign { name, value } => {
                let value = evaluate(value, &self.env)?;
                self.env.assign(name, value)?;
                Ok(Flow::Continue)
            }
            Node::Call { name, arguments } => {
                call_function(name, arguments, &self.env)?;
                Ok(Flow::Continue)
            }
            Node::Label { .. } => Ok(Flow::Continue),
            Node::Jump { label } => match labels.get(&label.literal) {
                Some(target) => {
                    trace!("jumping to label '{}' at {:?}", label.literal, target);
                    Ok(Flow::Jump(target.to_vec()))
                }
                None => runtime_error(
                    format!(
                        "cannot jump to label '{}' as it doesn't exist",
                        label.literal
                    ),
                    label,
                ),
            },
            Node::Use { path } => {
                self.import(path)?;
                Ok(Flow::Continue)
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    match evaluate(&branch.condition, &self.env)? {
                        Value::Boolean(true) => {
                            return self.execute_block(&branch.body, labels, &[])
                        }
                        Value::Boolean(false) => (),
                        other => {
                            return runtime_error(
                                format!("expected boolean value, found {}", other.type_name()),
                                branch.condition.token(),
                            )
                        }
                    }
                }

                match otherwise {
                    Some(body) => self.execute_block(body, labels, &[]),
                    None => Ok(Flow::Continue),
                }
            }
        }
    }

    fn import(&mut self, path: &Token) -> Result<()> {
        let TokenType::String(raw) = &path.token_type else {
            return runtime_error(format!("expected module path, found {}", path.describe()), path);
        };

        let module_path = resolve_module_path(&self.file, raw)?;
        debug!("'{}' resolved to {}", raw, module_path.display());

        let mut chain = self.imports.clone();
        chain.push(canonical_path(&self.file));

        let fallback = Some(Path::new(FALLBACK_DIR));
        let module = load_module(&module_path, fallback, self.options, &chain)?;
        self.env.merge(module);
        Ok(())
    }
}
