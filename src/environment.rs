use crate::error::{runtime_error, Result};
use crate::runtime::{Callable, Value};
use crate::tokenizer::Token;
use indexmap::IndexMap;
use std::fmt::{self, Display, Formatter};

/// Variable and function bindings of one execution pass.
///
/// A name is bound either as a variable or as a function, never both.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: IndexMap<String, Value>,
    functions: IndexMap<String, Callable>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Callable> {
        self.functions.get(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }

    pub fn functions(&self) -> &IndexMap<String, Callable> {
        &self.functions
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.functions.contains_key(&name.literal) {
            return runtime_error(
                format!(
                    "cannot assign value {:?} to function '{}'",
                    value, name.literal
                ),
                name,
            );
        }

        self.variables.insert(name.literal.clone(), value);
        Ok(())
    }

    pub fn define_function(&mut self, callable: Callable) {
        self.variables.shift_remove(&callable.name);
        self.functions.insert(callable.name.clone(), callable);
    }

    /// Copy every binding of `other` into this environment, replacing
    /// same-named bindings of either kind.
    pub fn merge(&mut self, other: Environment) {
        for (name, value) in other.variables {
            self.functions.shift_remove(&name);
            self.variables.insert(name, value);
        }

        for (_, callable) in other.functions {
            self.define_function(callable);
        }
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.variables {
            writeln!(f, "'{}': {:?}, '{}'", name, value, value.type_name())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::create_standard_env;
    use crate::tokenizer::tokenize;

    fn name_token(name: &str) -> Result<Token> {
        let mut tokens = tokenize(name)?;
        Ok(tokens.remove(0))
    }

    #[test]
    fn test_assign_and_overwrite() -> Result<()> {
        let mut env = Environment::new();
        env.assign(&name_token("x")?, Value::Int(1))?;
        env.assign(&name_token("x")?, Value::String("one".to_string()))?;

        assert_eq!(env.variable("x"), Some(&Value::String("one".to_string())));
        assert_eq!(env.variables().len(), 1);
        Ok(())
    }

    #[test]
    fn test_assign_to_function_fails() -> Result<()> {
        let mut env = create_standard_env();
        assert!(env.assign(&name_token("puts")?, Value::Int(1)).is_err());
        assert!(env.variable("puts").is_none());
        Ok(())
    }

    #[test]
    fn test_merge_overwrites() -> Result<()> {
        let mut importer = create_standard_env();
        importer.assign(&name_token("shared")?, Value::Int(1))?;
        importer.assign(&name_token("mine")?, Value::Boolean(true))?;

        let mut module = create_standard_env();
        module.assign(&name_token("shared")?, Value::Int(2))?;
        module.assign(&name_token("theirs")?, Value::Float(0.5))?;

        importer.merge(module);

        assert_eq!(importer.variable("shared"), Some(&Value::Int(2)));
        assert_eq!(importer.variable("mine"), Some(&Value::Boolean(true)));
        assert_eq!(importer.variable("theirs"), Some(&Value::Float(0.5)));
        assert!(importer.function("puts").is_some());
        assert!(importer.function("getStr").is_some());
        Ok(())
    }

    #[test]
    fn test_display_lists_variables() -> Result<()> {
        let mut env = create_standard_env();
        env.assign(&name_token("greeting")?, Value::String("hi".to_string()))?;
        env.assign(&name_token("count")?, Value::Int(3))?;

        assert_eq!(
            env.to_string(),
            "'greeting': \"hi\", 'string'\n'count': 3, 'int'\n"
        );
        Ok(())
    }
}
