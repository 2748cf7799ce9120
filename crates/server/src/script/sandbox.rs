// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox environment: the restricted standard library, the read-only
//! globals, the enum/set registries and the persistable-value rules.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::script::interp::{ScriptError, SResult, Vm};
use crate::script::value::{Builtin, Key, Table, Value};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const READ_ONLY_GLOBALS: &[&str] = &[
    "assert",
    "type",
    "pairs",
    "ipairs",
    "next",
    "tonumber",
    "tostring",
    "math",
    "string",
    "table",
    "VERSION",
    "VERSION_MAJOR",
    "VERSION_MINOR",
    "VERSION_PATCH",
    "world",
    "log",
    "enum",
    "set",
    "pv",
];

pub fn is_read_only_global(name: &str) -> bool {
    READ_ONLY_GLOBALS.contains(&name)
}

fn table_value(entries: Vec<(&str, Value)>) -> Value {
    let mut map = BTreeMap::new();
    for (name, value) in entries {
        map.insert(Key::Str(Rc::from(name)), value);
    }
    Value::Table(Rc::new(RefCell::new(Table { map, restricted: false })))
}

/// Enum types exposed to scripts: `(type, [(name, value)])`.
pub fn enum_types() -> &'static [(&'static str, &'static [(&'static str, i64)])] {
    &[
        (
            "turnout_position",
            &[
                ("unknown", 0),
                ("straight", 1),
                ("left", 2),
                ("right", 3),
                ("crossed", 4),
                ("diverged", 5),
                ("double_slip_straight_a", 6),
                ("double_slip_straight_b", 7),
            ],
        ),
        (
            "signal_aspect",
            &[("unknown", 0), ("stop", 1), ("proceed", 2), ("proceed_reduced_speed", 3)],
        ),
        (
            "block_state",
            &[("unknown", 0), ("free", 1), ("reserved", 2), ("occupied", 3)],
        ),
        ("sensor_state", &[("unknown", 0), ("free", 1), ("occupied", 2)]),
        (
            "direction_control_state",
            &[("none", 0), ("a_to_b", 1), ("b_to_a", 2), ("both", 3)],
        ),
        (
            "interface_state",
            &[("offline", 0), ("initializing", 1), ("online", 2), ("error", 3)],
        ),
        ("decoupler_state", &[("deactivated", 0), ("activated", 1)]),
        ("direction", &[("forward", 0), ("reverse", 1), ("unknown", 255)]),
        ("auto_yes_no", &[("auto", 0), ("yes", 1), ("no", 2)]),
    ]
}

/// Set types exposed to scripts: `(type, [(name, bit)])`.
pub fn set_types() -> &'static [(&'static str, &'static [(&'static str, u64)])] {
    &[(
        "world_state",
        &[("edit", 1), ("run", 2), ("power_on", 4), ("mute", 8), ("no_smoke", 16)],
    )]
}

/// Union of all defined bits, used for set complement.
pub fn set_mask(type_name: &str) -> u64 {
    set_types()
        .iter()
        .find(|(t, _)| *t == type_name)
        .map(|(_, bits)| bits.iter().fold(0, |acc, (_, b)| acc | b))
        .unwrap_or(0)
}

pub fn enum_value(type_name: &str, name: &str) -> Option<i64> {
    enum_types()
        .iter()
        .find(|(t, _)| *t == type_name)
        .and_then(|(_, values)| values.iter().find(|(n, _)| *n == name))
        .map(|(_, v)| *v)
}

pub fn enum_name(type_name: &'static str, value: i64) -> Option<&'static str> {
    enum_types()
        .iter()
        .find(|(t, _)| *t == type_name)
        .and_then(|(_, values)| values.iter().find(|(_, v)| *v == value))
        .map(|(n, _)| *n)
}

/// Build the sandbox globals for one script. `pv` is the script's persistent
/// dictionary.
pub fn install_globals(vm: &mut Vm, pv: Value) {
    let mut globals = vm.globals.borrow_mut();
    let mut set = |name: &str, value: Value| {
        globals.insert(name.to_owned(), value);
    };

    set("assert", Value::Builtin(Builtin::Assert));
    set("type", Value::Builtin(Builtin::Type));
    set("pairs", Value::Builtin(Builtin::Pairs));
    set("ipairs", Value::Builtin(Builtin::Ipairs));
    set("next", Value::Builtin(Builtin::Next));
    set("tonumber", Value::Builtin(Builtin::Tonumber));
    set("tostring", Value::Builtin(Builtin::Tostring));

    set(
        "string",
        table_value(vec![
            ("byte", Value::Builtin(Builtin::StringByte)),
            ("char", Value::Builtin(Builtin::StringChar)),
            ("find", Value::Builtin(Builtin::StringFind)),
            ("format", Value::Builtin(Builtin::StringFormat)),
            ("len", Value::Builtin(Builtin::StringLen)),
            ("lower", Value::Builtin(Builtin::StringLower)),
            ("rep", Value::Builtin(Builtin::StringRep)),
            ("reverse", Value::Builtin(Builtin::StringReverse)),
            ("sub", Value::Builtin(Builtin::StringSub)),
            ("upper", Value::Builtin(Builtin::StringUpper)),
        ]),
    );
    set(
        "math",
        table_value(vec![
            ("abs", Value::Builtin(Builtin::MathAbs)),
            ("ceil", Value::Builtin(Builtin::MathCeil)),
            ("floor", Value::Builtin(Builtin::MathFloor)),
            ("huge", Value::Num(f64::INFINITY)),
            ("max", Value::Builtin(Builtin::MathMax)),
            ("maxinteger", Value::Int(i64::MAX)),
            ("min", Value::Builtin(Builtin::MathMin)),
            ("mininteger", Value::Int(i64::MIN)),
            ("pi", Value::Num(std::f64::consts::PI)),
            ("sqrt", Value::Builtin(Builtin::MathSqrt)),
            ("tointeger", Value::Builtin(Builtin::MathTointeger)),
            ("type", Value::Builtin(Builtin::MathType)),
        ]),
    );
    set(
        "table",
        table_value(vec![
            ("concat", Value::Builtin(Builtin::TableConcat)),
            ("insert", Value::Builtin(Builtin::TableInsert)),
            ("remove", Value::Builtin(Builtin::TableRemove)),
            ("unpack", Value::Builtin(Builtin::TableUnpack)),
        ]),
    );
    set(
        "log",
        table_value(vec![
            ("debug", Value::Builtin(Builtin::LogDebug)),
            ("info", Value::Builtin(Builtin::LogInfo)),
            ("notice", Value::Builtin(Builtin::LogNotice)),
            ("warning", Value::Builtin(Builtin::LogWarning)),
            ("error", Value::Builtin(Builtin::LogError)),
            ("critical", Value::Builtin(Builtin::LogCritical)),
            ("fatal", Value::Builtin(Builtin::LogFatal)),
        ]),
    );

    // Version constants.
    set("VERSION", Value::str(VERSION));
    let mut parts = VERSION.split('.').filter_map(|p| p.parse::<i64>().ok());
    set("VERSION_MAJOR", Value::Int(parts.next().unwrap_or(0)));
    set("VERSION_MINOR", Value::Int(parts.next().unwrap_or(0)));
    set("VERSION_PATCH", Value::Int(parts.next().unwrap_or(0)));

    // Enum values: `enum.<type>.<name>`.
    let mut enum_root = BTreeMap::new();
    for (type_name, values) in enum_types() {
        let mut type_table = BTreeMap::new();
        for (name, value) in *values {
            type_table.insert(
                Key::Str(Rc::from(*name)),
                Value::Enum { type_name, name: Rc::from(*name), value: *value },
            );
        }
        enum_root.insert(
            Key::Str(Rc::from(*type_name)),
            Value::Table(Rc::new(RefCell::new(Table { map: type_table, restricted: false }))),
        );
    }
    set("enum", Value::Table(Rc::new(RefCell::new(Table { map: enum_root, restricted: false }))));

    // Set values: `set.<type>.<name>`.
    let mut set_root = BTreeMap::new();
    for (type_name, values) in set_types() {
        let mut type_table = BTreeMap::new();
        for (name, bits) in *values {
            type_table.insert(
                Key::Str(Rc::from(*name)),
                Value::Set { type_name, bits: *bits },
            );
        }
        set_root.insert(
            Key::Str(Rc::from(*type_name)),
            Value::Table(Rc::new(RefCell::new(Table { map: type_table, restricted: false }))),
        );
    }
    set("set", Value::Table(Rc::new(RefCell::new(Table { map: set_root, restricted: false }))));

    // Domain root + persistent variables.
    set("world", Value::Object(Rc::from("world")));
    set("pv", pv);
}

/// Validate a value for storage in a persistent dictionary. Nested tables
/// are accepted (and become restricted); recursion is rejected.
pub fn check_persistable(value: &Value) -> SResult<()> {
    fn walk(value: &Value, seen: &mut Vec<*const ()>) -> SResult<()> {
        match value {
            Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Num(_)
            | Value::Str(_)
            | Value::Object(_)
            | Value::Enum { .. }
            | Value::Set { .. }
            | Value::Event { .. }
            | Value::Method { .. } => Ok(()),
            Value::Table(table) => {
                let ptr = Rc::as_ptr(table).cast::<()>();
                if seen.contains(&ptr) {
                    return Err(ScriptError::new("table contains recursion"));
                }
                seen.push(ptr);
                table.borrow_mut().restricted = true;
                for v in table.borrow().map.values() {
                    walk(v, seen)?;
                }
                seen.pop();
                Ok(())
            }
            Value::Function(_) | Value::Builtin(_) => {
                Err(ScriptError::new(format!("cannot persist a {} value", value.type_name())))
            }
        }
    }
    walk(value, &mut Vec::new())
}

/// Minimal `string.format`: %s %d %i %x %f %%.
pub fn simple_format(format: &str, args: &[Value]) -> SResult<String> {
    let mut out = String::new();
    let mut chars = format.chars().peekable();
    let mut next_arg = 0usize;
    let mut arg = |n: &mut usize| -> Value {
        let v = args.get(*n).cloned().unwrap_or(Value::Nil);
        *n += 1;
        v
    };
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') => out.push_str(&arg(&mut next_arg).display()),
            Some('d') | Some('i') => {
                let v = arg(&mut next_arg)
                    .as_int()
                    .ok_or_else(|| ScriptError::new("format expects an integer"))?;
                out.push_str(&v.to_string());
            }
            Some('x') => {
                let v = arg(&mut next_arg)
                    .as_int()
                    .ok_or_else(|| ScriptError::new("format expects an integer"))?;
                out.push_str(&format!("{v:x}"));
            }
            Some('f') => {
                let v = arg(&mut next_arg)
                    .as_number()
                    .ok_or_else(|| ScriptError::new("format expects a number"))?;
                out.push_str(&format!("{v:.6}"));
            }
            other => {
                return Err(ScriptError::new(format!(
                    "unsupported format specifier {other:?}"
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
