use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`. Only top-level commas
/// separate arguments; commas inside groups belong to their group, and
/// commas between the `|...|` of a closure's parameter list are kept. A `|`
/// anywhere else is an operator.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut in_closure_params = false;

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' && !in_closure_params => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            TokenTree::Punct(p) if p.as_char() == '|' => {
                if in_closure_params {
                    in_closure_params = false;
                } else if starts_expression(&current) {
                    in_closure_params = true;
                }
                current.push(token);
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Whether a `|` following `tokens` opens a closure's parameter list
/// rather than being a bitwise or.
fn starts_expression(tokens: &[TokenTree]) -> bool {
    match tokens.last() {
        None => true,
        Some(TokenTree::Ident(id)) => matches!(id.to_string().as_str(), "move" | "async"),
        Some(_) => false,
    }
}

/// Converts a slice of tokens back into Rust source.
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    tokens.iter().cloned().collect::<TokenStream>().to_string()
}

/// Removes the `async` keyword from a function item.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) {
    if let Some(pos) = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))
    {
        tokens.remove(pos);
    }
}

/// Position of a function item's body, its last brace-delimited group.
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Builds the runtime construction expression for an attribute's
/// arguments.
///
/// Recognizes `worker_threads = N` and `thread_name = "..."`; anything else
/// is ignored.
pub(crate) fn runtime_builder(attr: &TokenStream) -> String {
    let mut builder = String::from("::tandem::RuntimeBuilder::new()");

    for arg in split_args(attr.clone()) {
        let [TokenTree::Ident(key), TokenTree::Punct(eq), value] = arg.as_slice() else {
            continue;
        };

        if eq.as_char() != '=' {
            continue;
        }

        match (key.to_string().as_str(), value) {
            ("worker_threads", TokenTree::Literal(n)) => {
                if let Ok(n) = n.to_string().parse::<usize>() {
                    builder.push_str(&format!(".worker_threads({n})"));
                }
            }
            ("thread_name", TokenTree::Literal(name)) => {
                builder.push_str(&format!(".thread_name({name})"));
            }
            _ => {}
        }
    }

    builder.push_str(".build()");
    builder
}

/// A `compile_error!` invocation carrying `message`.
pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?})")
        .parse()
        .unwrap_or_default()
}

/// Parses generated source, turning a parse failure into a compile error.
pub(crate) fn parse_or_error(context: &str, source: &str) -> TokenStream {
    source
        .parse()
        .unwrap_or_else(|err| compile_error(&format!("{context} macro error: {err}")))
}
