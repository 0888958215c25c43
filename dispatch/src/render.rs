//! Turns a [`Program`] into Rust source.
//!
//! Every item is built with `quote` and written on its own line. Layout is
//! left to rustfmt.

use proc_macro2::{Ident, Literal as TokenLiteral, Span, TokenStream};
use quote::{format_ident, quote, ToTokens};

use crate::emit::{Dispatch, Emission, HandlerRef, Match};
use crate::error::{Error, Result};
use crate::record::TableName;
use crate::resolver::{GeneratedTable, Program};
use crate::schema::{is_identifier, Literal};

pub const HEADER: &str = "// @generated by lookup-gen. Do not edit.";

/// What a dispatch function does when no arm matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unmatched {
    /// `panic!` naming the field that failed.
    #[default]
    Panic,
    /// Return `Option` and yield `None`.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Root function name, sub-tables append `_<table>`.
    pub function: String,
    pub instruction_type: String,
    pub state_type: String,
    pub result_type: String,
    pub handler_type: String,
    /// Module holding the root table's handlers. Sub-tables use
    /// `<module>_<table>`. `None` emits no imports.
    pub handler_module: Option<String>,
    pub unmatched: Unmatched,
    pub handler_table: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            function: "lookup".into(),
            instruction_type: "crate::Instruction".into(),
            state_type: "State".into(),
            result_type: "InstResult".into(),
            handler_type: "InstructionFn".into(),
            handler_module: None,
            unmatched: Unmatched::Panic,
            handler_table: false,
        }
    }
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn", "else", "enum",
    "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "macro", "match", "mod", "move",
    "mut", "override", "priv", "pub", "ref", "return", "static", "struct", "trait", "true", "try", "type", "typeof",
    "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// An identifier, raw if it collides with a keyword.
fn ident(option: &'static str, name: &str) -> Result<Ident> {
    if !is_identifier(name) || matches!(name, "self" | "Self" | "super" | "crate") {
        return Err(Error::InvalidOption {
            option,
            value: name.to_owned(),
        });
    }
    if KEYWORDS.contains(&name) {
        Ok(Ident::new_raw(name, Span::call_site()))
    } else {
        Ok(Ident::new(name, Span::call_site()))
    }
}

fn tokens(option: &'static str, text: &str) -> Result<TokenStream> {
    let invalid = || Error::InvalidOption {
        option,
        value: text.to_owned(),
    };
    if text.trim().is_empty() {
        return Err(invalid());
    }
    text.parse().map_err(|_| invalid())
}

fn literal(value: Literal) -> TokenStream {
    match value {
        Literal::Bool(true) => quote!(true),
        Literal::Bool(false) => quote!(false),
        Literal::Int(n) => TokenLiteral::u32_unsuffixed(n).into_token_stream(),
    }
}

/// Options parsed into tokens once per run.
struct Names {
    instruction_path: TokenStream,
    instruction: Ident,
    state: TokenStream,
    result: TokenStream,
    handler_type: Ident,
    unmatched: Unmatched,
}

impl Names {
    fn new(options: &RenderOptions) -> Result<Names> {
        let last = options.instruction_type.rsplit("::").next().unwrap_or_default().trim();
        Ok(Names {
            instruction_path: tokens("instruction_type", &options.instruction_type)?,
            instruction: ident("instruction_type", last)?,
            state: tokens("state_type", &options.state_type)?,
            result: tokens("result_type", &options.result_type)?,
            handler_type: ident("handler_type", &options.handler_type)?,
            unmatched: options.unmatched,
        })
    }

    fn return_type(&self) -> TokenStream {
        let handler_type = &self.handler_type;
        match self.unmatched {
            Unmatched::Panic => quote!((#handler_type, usize)),
            Unmatched::None => quote!(Option<(#handler_type, usize)>),
        }
    }
}

fn function_name(options: &RenderOptions, table: &TableName) -> Result<Ident> {
    ident("function", &format!("{}{}", options.function, table.suffix()))
}

struct TableRenderer<'a> {
    options: &'a RenderOptions,
    names: &'a Names,
    table: &'a TableName,
}

impl TableRenderer<'_> {
    fn dispatch(&self, dispatch: &Dispatch) -> Result<TokenStream> {
        match dispatch {
            Dispatch::Handler(handler) => self.handler(handler),
            Dispatch::Delegate(table) => {
                let function = function_name(self.options, table)?;
                Ok(quote!(#function(instruction)))
            }
            Dispatch::Match(m) => self.matches(m),
        }
    }

    fn handler(&self, handler: &HandlerRef) -> Result<TokenStream> {
        let name = ident("handler", &handler.name)?;
        let cycles = TokenLiteral::u32_unsuffixed(handler.cycles);
        Ok(match self.names.unmatched {
            Unmatched::Panic => quote!((#name, #cycles)),
            Unmatched::None => quote!(Some((#name, #cycles))),
        })
    }

    fn matches(&self, m: &Match) -> Result<TokenStream> {
        let accessor = ident("fields", &m.field.name)?;
        let mut arms = Vec::with_capacity(m.arms.len() + 1);
        for (value, child) in &m.arms {
            let value = literal(*value);
            let child = self.dispatch(child)?;
            arms.push(quote!(#value => #child,));
        }

        let fallback = match &m.fallback {
            Some(child) => self.dispatch(child)?,
            None => match self.names.unmatched {
                Unmatched::Panic => {
                    let message = format!("Unknown instruction {{:?}} (using field {})", m.field.name);
                    quote!(panic!(#message, instruction))
                }
                Unmatched::None => quote!(None),
            },
        };
        log::trace!("{}: {} arms on {}", self.table, m.arms.len(), m.field.name);

        Ok(quote! {
            match instruction.#accessor() {
                #(#arms)*
                _ => #fallback,
            }
        })
    }

    fn function(&self, emission: &Emission) -> Result<TokenStream> {
        let name = function_name(self.options, self.table)?;
        let instruction = &self.names.instruction;
        let ret = self.names.return_type();
        let body = self.dispatch(&emission.body)?;
        Ok(quote! {
            pub fn #name(instruction: #instruction) -> #ret {
                #body
            }
        })
    }

    fn handler_table(&self, emission: &Emission) -> Result<TokenStream> {
        let name = format_ident!("HANDLERS{}", self.table.suffix().to_uppercase());
        let handler_type = &self.names.handler_type;
        let layout = emission.handler_layout();
        let count = TokenLiteral::usize_unsuffixed(layout.len());
        let handlers = layout.iter().map(|h| ident("handler", &h.name)).collect::<Result<Vec<_>>>()?;
        Ok(quote! {
            pub const #name: [#handler_type; #count] = [#(#handlers),*];
        })
    }

    fn import(&self) -> Result<Option<TokenStream>> {
        self.options
            .handler_module
            .as_ref()
            .map(|module| {
                let module = tokens("handler_module", &format!("{}{}", module, self.table.suffix()))?;
                Ok(quote!(use #module::*;))
            })
            .transpose()
    }
}

/// Renders the complete lookup module for a program.
pub fn render(program: &Program, options: &RenderOptions) -> Result<String> {
    let names = Names::new(options)?;
    let mut items: Vec<TokenStream> = Vec::new();

    let instruction_path = &names.instruction_path;
    let handler_type = &names.handler_type;
    let instruction = &names.instruction;
    let state = &names.state;
    let result = &names.result;
    items.push(quote!(use #instruction_path;));
    items.push(quote!(pub type #handler_type = fn(&mut #state, #instruction) -> #result;));

    for GeneratedTable { name, emission, .. } in &program.tables {
        let renderer = TableRenderer {
            options,
            names: &names,
            table: name,
        };
        items.extend(renderer.import()?);
        items.push(renderer.function(emission)?);
        if options.handler_table {
            items.push(renderer.handler_table(emission)?);
        }
    }

    Ok(join(&items))
}

/// Renders placeholder handlers for one table, one per distinct handler name
/// in layout order.
pub fn render_stubs(table: &GeneratedTable, options: &RenderOptions) -> Result<String> {
    let names = Names::new(options)?;
    let instruction_path = &names.instruction_path;
    let instruction = &names.instruction;
    let state = &names.state;
    let result = &names.result;

    let mut items = vec![quote!(use #instruction_path;)];
    let mut seen: Vec<&str> = Vec::new();
    let layout = table.emission.handler_layout();
    for handler in &layout {
        if seen.contains(&handler.name.as_str()) {
            continue;
        }
        seen.push(&handler.name);

        let name = ident("handler", &handler.name)?;
        let message = format!("Instruction {} not implemented", handler.name);
        items.push(quote! {
            pub fn #name(_state: &mut #state, _instruction: #instruction) -> #result {
                unimplemented!(#message)
            }
        });
    }

    Ok(join(&items))
}

/// File name of the stub module for a table.
pub fn stub_file_name(table: &TableName) -> String {
    format!("instruction_impl{}.rs", table.suffix())
}

fn join(items: &[TokenStream]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\n\n");
    for item in items {
        out.push_str(&item.to_string());
        out.push('\n');
    }
    out
}
