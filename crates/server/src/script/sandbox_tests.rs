// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::cell::RefCell;
use std::rc::Rc;

use crate::script::value::{Key, Table, Value};

use super::{
    check_persistable, enum_value, install_globals, is_read_only_global, set_mask, simple_format,
};

#[test]
fn read_only_globals_cover_the_sandbox_surface() {
    for name in ["world", "log", "enum", "set", "pairs", "tostring", "VERSION", "pv"] {
        assert!(is_read_only_global(name), "{name} must be read-only");
    }
    assert!(!is_read_only_global("my_variable"));
}

#[test]
fn enum_registry_lookups() {
    assert_eq!(enum_value("turnout_position", "straight"), Some(1));
    assert_eq!(enum_value("signal_aspect", "proceed"), Some(2));
    assert_eq!(enum_value("signal_aspect", "bogus"), None);
    assert_eq!(enum_value("bogus_type", "stop"), None);
}

#[test]
fn set_mask_covers_all_bits() {
    assert_eq!(set_mask("world_state"), 1 | 2 | 4 | 8 | 16);
    assert_eq!(set_mask("unknown"), 0);
}

#[test]
fn install_globals_populates_the_surface() {
    let mut vm = crate::script::interp::Vm::new();
    install_globals(&mut vm, Value::table());
    let globals = vm.globals.borrow();
    for name in ["assert", "string", "math", "table", "log", "enum", "set", "world", "pv"] {
        assert!(globals.contains_key(name), "{name} missing");
    }
}

#[test]
fn scalars_are_persistable() {
    for v in [
        Value::Nil,
        Value::Bool(true),
        Value::Int(1),
        Value::Num(1.5),
        Value::str("s"),
        Value::Object(Rc::from("b1")),
    ] {
        assert!(check_persistable(&v).is_ok(), "{v:?}");
    }
}

#[test]
fn functions_are_not_persistable() {
    let v = Value::Builtin(crate::script::value::Builtin::Tostring);
    assert!(check_persistable(&v).is_err());
}

#[test]
fn nested_tables_become_restricted() {
    let inner = Rc::new(RefCell::new(Table::new()));
    let outer = Rc::new(RefCell::new(Table::new()));
    outer
        .borrow_mut()
        .map
        .insert(Key::Str(Rc::from("inner")), Value::Table(Rc::clone(&inner)));

    assert!(check_persistable(&Value::Table(Rc::clone(&outer))).is_ok());
    assert!(inner.borrow().restricted);
}

#[test]
fn recursive_tables_are_rejected() {
    let table = Rc::new(RefCell::new(Table::new()));
    table
        .borrow_mut()
        .map
        .insert(Key::Str(Rc::from("me")), Value::Table(Rc::clone(&table)));
    let result = check_persistable(&Value::Table(table));
    assert!(matches!(result, Err(e) if e.message.contains("recursion")));
}

#[test]
fn format_specifiers() {
    let ok = simple_format("%s=%d 0x%x %f%%", &[
        Value::str("n"),
        Value::Int(7),
        Value::Int(255),
        Value::Num(1.5),
    ]);
    assert!(matches!(&ok, Ok(s) if s == "n=7 0xff 1.500000%"), "{ok:?}");
    assert!(simple_format("%q", &[]).is_err());
}
