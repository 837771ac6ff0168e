//! Parse dialect DSL source into the schema model using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DialectParser;

/// Parse dialect source into the raw schema model.
pub fn parse(source: &str) -> Result<DialectDef, String> {
    let pairs = DialectParser::parse(Rule::dialect, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_dialect(pair)
}

fn build_dialect(pair: pest::iterators::Pair<Rule>) -> Result<DialectDef, String> {
    let mut messages = Vec::new();
    let mut enums = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_section => enums.push(build_enum(inner)?),
            Rule::message_section => messages.push(build_message(inner)?),
            _ => {}
        }
    }

    Ok(DialectDef { messages, enums })
}

fn build_enum(pair: pest::iterators::Pair<Rule>) -> Result<EnumDef, String> {
    let mut name = String::new();
    let mut entries = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_entry => {
                let mut it = inner.into_inner();
                let entry_name = it.next().ok_or("enum entry: name")?.as_str().to_string();
                let value_pair = it.next().ok_or("enum entry: value")?;
                let value = parse_int(value_pair.as_str())?;
                entries.push(EnumEntry { name: entry_name, value });
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum section: missing name".to_string());
    }
    Ok(EnumDef { name, entries })
}

fn build_message(pair: pest::iterators::Pair<Rule>) -> Result<MessageDef, String> {
    let mut id: Option<u8> = None;
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::int => {
                let raw = parse_int(inner.as_str())?;
                id = Some(
                    u8::try_from(raw)
                        .map_err(|_| format!("message id {} out of range (0-255)", raw))?,
                );
            }
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    let id = id.ok_or("message: missing id")?;
    if name.is_empty() {
        return Err("message: missing name".to_string());
    }
    Ok(MessageDef { id, name, fields })
}

fn build_field(pair: pest::iterators::Pair<Rule>) -> Result<FieldDecl, String> {
    let mut name = String::new();
    let mut type_keyword = String::new();
    let mut array_len = 0usize;
    let mut enum_name = None;
    let mut is_const = false;
    let mut default = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::const_kw => is_const = true,
            Rule::type_name => type_keyword = inner.as_str().to_string(),
            Rule::array_suffix => {
                let n_pair = inner.into_inner().next().ok_or("array length")?;
                let n = parse_int(n_pair.as_str())?;
                if n < 1 || n > 255 {
                    return Err(format!("field {}: array length {} out of range (1-255)", name, n));
                }
                array_len = n as usize;
            }
            Rule::enum_tag => {
                let e = inner.into_inner().next().ok_or("enum tag: name")?;
                enum_name = Some(e.as_str().to_string());
            }
            Rule::default_value => {
                let v_pair = inner.into_inner().next().ok_or("default value")?;
                default = Some(parse_int(v_pair.as_str())?);
            }
            _ => {}
        }
    }

    let constant = if is_const {
        let v = default.ok_or_else(|| format!("const field {} needs a value", name))?;
        Some(v as u64)
    } else {
        None
    };

    Ok(FieldDecl {
        name,
        type_keyword,
        array_len,
        enum_name,
        constant,
    })
}

fn parse_int(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = body.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).map_err(|e| format!("bad integer {}: {}", s, e))?
    } else {
        body.parse::<i64>().map_err(|e| format!("bad integer {}: {}", s, e))?
    };
    Ok(if neg { -value } else { value })
}
