mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Waits for every awaitable and yields their values as a tuple, in
/// argument order.
///
/// Expands to a future of `tandem::Result<(A, B, ...)>`. Each argument must
/// be a `Future<Output = tandem::Result<_>> + Send + 'static`; the values may
/// have different types. The first failure is returned and the values are
/// discarded.
#[proc_macro]
pub fn when_all(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);

    if args.is_empty() {
        return utils::compile_error("when_all! requires at least one awaitable");
    }

    let count = args.len();
    let mut out = String::new();

    out.push_str("async move {\n");
    out.push_str(&format!("match ::tandem::combinator::FanIn::new({count}) {{\n"));
    out.push_str("    ::core::result::Result::Err(__e) => ::core::result::Result::Err(__e),\n");
    out.push_str("    ::core::result::Result::Ok(mut __fan_in) => {\n");

    for (i, expr_tokens) in args.iter().enumerate() {
        let expr = utils::tokens_to_string(expr_tokens);
        out.push_str(&format!("        let __slot{i} = __fan_in.attach({expr});\n"));
    }

    let values = (0..count)
        .map(|i| format!("__slot{i}.take(&__done)"))
        .collect::<Vec<_>>()
        .join(", ");

    out.push_str("        match __fan_in.await {\n");
    out.push_str(&format!(
        "            ::core::result::Result::Ok(__done) => ::core::result::Result::Ok(({values},)),\n"
    ));
    out.push_str("            ::core::result::Result::Err(__e) => ::core::result::Result::Err(__e),\n");
    out.push_str("        }\n");
    out.push_str("    }\n");
    out.push_str("}\n");
    out.push_str("}\n");

    utils::parse_or_error("when_all!", &out)
}

/// Resolves with the first awaitable to finish, together with its
/// position.
///
/// Expands to a future of `tandem::Result<(T, usize)>`. Every argument
/// must produce the same `tandem::Result<T>`; mixing types is a compile
/// error. The losers keep running and their outcomes are discarded.
#[proc_macro]
pub fn when_any(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);

    if args.is_empty() {
        return utils::compile_error("when_any! requires at least one awaitable");
    }

    let racers = args
        .iter()
        .map(|expr_tokens| {
            format!(
                "::tandem::combinator::boxed({})",
                utils::tokens_to_string(expr_tokens)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n        ");

    let out = format!(
        "async move {{
    let __racers = ::std::vec![
        {racers}
    ];

    match ::tandem::combinator::when_any(__racers) {{
        ::core::result::Result::Ok(__race) => __race.await,
        ::core::result::Result::Err(__e) => ::core::result::Result::Err(__e),
    }}
}}"
    );

    utils::parse_or_error("when_any!", &out)
}

#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();
    utils::strip_async(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return TokenStream::new();
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let new_block = format!(
        "{{
            let runtime = {};
            runtime
                .block_on(async move {{
                    {}
                }})
        }}",
        utils::runtime_builder(&attr),
        block
    );

    tokens[pos] = TokenTree::Group(Group::new(
        Delimiter::Brace,
        utils::parse_or_error("#[tandem::main]", &new_block),
    ));

    tokens.into_iter().collect()
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens = item.into_iter().collect::<Vec<_>>();
    utils::strip_async(&mut tokens);

    let Some(pos) = utils::body_position(&tokens) else {
        return TokenStream::new();
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let new_block = format!(
        "{{
        let runtime = {};
        runtime
            .block_on(async move {{ {} }})
    }}",
        utils::runtime_builder(&attr),
        block
    );

    tokens[pos] = TokenTree::Group(Group::new(
        Delimiter::Brace,
        utils::parse_or_error("#[tandem::test]", &new_block),
    ));

    let mut result: Vec<TokenTree> = utils::parse_or_error("#[tandem::test]", "#[test]")
        .into_iter()
        .collect();
    result.extend(tokens);

    result.into_iter().collect()
}
