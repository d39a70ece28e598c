// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use covah_core::{coding_error, Token, Value};
use std::collections::HashMap;

/// What a scene delegate sees while executing a computation: the resolved
/// inputs to read and the outputs to write.
pub trait ExtComputationContext {
    /// Returns the input `name`. A missing input is a coding error.
    fn input_value(&self, name: &Token) -> Option<&Value>;

    /// Returns the input `name`, if present.
    fn optional_input_value(&self, name: &Token) -> Option<&Value>;

    /// Stores the output `name`.
    fn set_output_value(&mut self, name: &Token, value: Value);

    /// Marks the computation as failed for this frame.
    fn raise_computation_error(&mut self);
}

/// The context used by CPU computations.
#[derive(Debug, Default)]
pub struct ExtComputationContextImpl {
    inputs: HashMap<Token, Value>,
    outputs: HashMap<Token, Value>,
    computation_error: bool,
}

impl ExtComputationContextImpl {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provides the input `name`.
    pub fn set_input_value(&mut self, name: Token, value: Value) {
        self.inputs.insert(name, value);
    }

    /// Returns the output `name`, if the computation wrote it.
    pub fn output_value(&self, name: &Token) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Removes and returns the output `name`.
    pub fn take_output_value(&mut self, name: &Token) -> Option<Value> {
        self.outputs.remove(name)
    }

    /// Returns `true` if the computation raised an error.
    pub fn has_computation_error(&self) -> bool {
        self.computation_error
    }
}

impl ExtComputationContext for ExtComputationContextImpl {
    fn input_value(&self, name: &Token) -> Option<&Value> {
        let value = self.inputs.get(name);
        if value.is_none() {
            coding_error!("computation input '{}' not found", name);
        }
        value
    }

    fn optional_input_value(&self, name: &Token) -> Option<&Value> {
        self.inputs.get(name)
    }

    fn set_output_value(&mut self, name: &Token, value: Value) {
        self.outputs.insert(name.clone(), value);
    }

    fn raise_computation_error(&mut self) {
        self.computation_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covah_core::diagnostic::coding_error_count;

    #[test]
    fn test_missing_input_reports_only_when_required() {
        let context = ExtComputationContextImpl::new();
        let name = Token::new("scale");

        let before = coding_error_count();
        assert!(context.optional_input_value(&name).is_none());
        assert_eq!(coding_error_count(), before);
        assert!(context.input_value(&name).is_none());
        assert_eq!(coding_error_count(), before + 1);
    }

    #[test]
    fn test_outputs_and_error_flag() {
        let mut context = ExtComputationContextImpl::new();
        context.set_input_value(Token::new("scale"), Value::Float(2.0));
        context.set_output_value(&Token::new("points"), Value::from(vec![[0.0f32; 3]]));
        context.raise_computation_error();

        assert_eq!(context.input_value(&Token::new("scale")), Some(&Value::Float(2.0)));
        assert!(context.output_value(&Token::new("points")).is_some());
        assert!(context.has_computation_error());
        assert!(context.take_output_value(&Token::new("points")).is_some());
        assert!(context.output_value(&Token::new("points")).is_none());
    }
}
