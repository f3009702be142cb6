use crate::environment::Environment;
use crate::runtime::{Arity, Callable, Value};
use std::io::{self, Write};
use std::rc::Rc;

type BuiltInResult = std::result::Result<Option<Value>, String>;

pub fn create_standard_env() -> Environment {
    let mut env = Environment::new();

    // Helper macro to define built-in functions with error handling
    macro_rules! define_builtin {
        ($name:expr, $arity:expr, $func:expr) => {
            env.define_function(Callable {
                name: $name.to_string(),
                arity: $arity,
                func: Rc::new($func),
            });
        };
    }

    define_builtin!("puts", Arity::Variadic, |args: Vec<Value>| -> BuiltInResult {
        let line = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", line);
        Ok(None)
    });

    define_builtin!("getStr", Arity::Exact(1), |args: Vec<Value>| -> BuiltInResult {
        let prompt = args
            .first()
            .ok_or_else(|| "getStr requires 1 argument".to_string())?;

        // Print the prompt and flush stdout to ensure it appears before input
        match prompt {
            Value::String(s) => {
                print!("{}", s);
                io::stdout()
                    .flush()
                    .map_err(|e| format!("IO error: {}", e))?;
            }
            other => {
                return Err(format!(
                    "getStr prompt must be a string, found {}",
                    other.type_name()
                ))
            }
        }

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| format!("Failed to read input: {}", e))?;

        Ok(Some(Value::String(
            input.trim_end_matches(['\n', '\r']).to_string(),
        )))
    });

    env
}
