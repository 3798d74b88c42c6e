//! Per-model token pricing used to turn reported usage into a debit.

const M: f64 = 1_000_000.0;

/// USD per token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

pub fn price_for(model: &str) -> Option<ModelPrice> {
    let (input, output) = match model {
        "gpt-4.1" => (2.00, 8.00),
        "gpt-4.1-mini" => (0.40, 1.60),
        "gpt-4.1-nano" => (0.10, 0.40),
        "gpt-4o" => (2.50, 10.00),
        "gpt-4o-mini" => (0.15, 0.60),
        "o1" => (15.00, 60.00),
        "o3" => (10.00, 40.00),
        "o1-mini" | "o3-mini" | "o4-mini" => (1.10, 4.40),
        "gpt-4" => (30.00, 60.00),
        _ => return None,
    };
    Some(ModelPrice {
        input: input / M,
        output: output / M,
    })
}

/// Cost of one completion round. A model missing from the table prices at
/// zero rather than failing the chat.
pub fn completion_cost(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    match price_for(model) {
        Some(price) => price.input * input_tokens as f64 + price.output * output_tokens as f64,
        None => {
            tracing::warn!("No pricing for model `{model}`, charging nothing");
            0.0
        }
    }
}
