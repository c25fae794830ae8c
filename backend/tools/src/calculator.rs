use async_trait::async_trait;
use confab_core::{ConfabError, Tool, ToolOutput};
use serde::Deserialize;
use serde_json::Value;

pub const CALCULATOR_TOOL_NAME: &str = "calculator";

/// Integer arithmetic over `+ - * /`; division truncates toward zero.
pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    a: i64,
    b: i64,
    operator: String,
}

pub fn calculate(a: i64, b: i64, operator: &str) -> Result<i64, ConfabError> {
    let overflow = || ConfabError::Overflow(format!("{a} {operator} {b}"));
    match operator {
        "+" => a.checked_add(b).ok_or_else(overflow),
        "-" => a.checked_sub(b).ok_or_else(overflow),
        "*" => a.checked_mul(b).ok_or_else(overflow),
        "/" => {
            if b == 0 {
                return Err(ConfabError::DivisionByZero);
            }
            a.checked_div(b).ok_or_else(overflow)
        }
        other => Err(ConfabError::UnsupportedOperator(other.to_string())),
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        CALCULATOR_TOOL_NAME
    }

    fn description(&self) -> &str {
        "A simple calculator that performs integer arithmetic on two numbers"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer", "description": "Left operand"},
                "b": {"type": "integer", "description": "Right operand"},
                "operator": {"type": "string", "enum": ["+", "-", "*", "/"], "description": "Operator"}
            },
            "required": ["a", "b", "operator"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolOutput> {
        let input: CalculatorInput =
            serde_json::from_value(args).map_err(|e| ConfabError::InvalidArguments {
                tool: CALCULATOR_TOOL_NAME.into(),
                message: e.to_string(),
            })?;
        let result = calculate(input.a, input.b, input.operator.trim())?;
        Ok(ToolOutput::text(result.to_string()))
    }
}
