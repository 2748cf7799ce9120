// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tree-walking evaluator with a cooperative execution budget.
//!
//! Every top-level call gets a fresh budget: 10 ms hard abort, 5 ms warning.
//! The check runs every few hundred evaluation steps, so runaway scripts are
//! cut off without instrumenting every instruction with a clock read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::script::ast::{BinOp, Block, Expr, Stat, TableField, UnOp};
use crate::script::bridge::{HostBridge, LogLevel};
use crate::script::sandbox;
use crate::script::value::{Builtin, Closure, Key, Table, Value};

pub const ERR_TIMEOUT: &str = "Exceeded maximum execution time.";
pub const ERR_DEAD_OBJECT: &str = "dead object";

const EXECUTION_LIMIT: Duration = Duration::from_millis(10);
const EXECUTION_WARN: Duration = Duration::from_millis(5);
const FUEL_SLICE: u32 = 512;
const CALL_DEPTH_LIMIT: u32 = 120;

/// Script-level error (also used for host-raised errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptError {}

pub type SResult<T> = Result<T, ScriptError>;

type Scope = Rc<RefCell<HashMap<String, Value>>>;

/// Per-script interpreter state that survives between invocations.
#[derive(Debug, Default)]
pub struct Vm {
    pub globals: Scope,
    /// Functions pinned for event handlers, by registry key.
    pub registry: HashMap<u32, Value>,
    next_registry: u32,
}

impl Vm {
    pub fn new() -> Self {
        Self { next_registry: 1, ..Self::default() }
    }

    pub fn register(&mut self, value: Value) -> u32 {
        let key = self.next_registry;
        self.next_registry += 1;
        self.registry.insert(key, value);
        key
    }

    pub fn unregister(&mut self, key: u32) {
        self.registry.remove(&key);
    }
}

enum Flow {
    Normal,
    Break,
    Return(Value),
}

struct ExecBudget {
    start: Instant,
    fuel: u32,
    warned: bool,
}

/// One invocation: a budget plus the host bridge.
pub struct Exec<'a> {
    pub vm: &'a mut Vm,
    pub bridge: &'a mut dyn HostBridge,
    pub script_id: &'a str,
    budget: ExecBudget,
    depth: u32,
}

impl<'a> Exec<'a> {
    pub fn new(vm: &'a mut Vm, bridge: &'a mut dyn HostBridge, script_id: &'a str) -> Self {
        Self {
            vm,
            bridge,
            script_id,
            budget: ExecBudget { start: Instant::now(), fuel: FUEL_SLICE, warned: false },
            depth: 0,
        }
    }

    fn tick(&mut self) -> SResult<()> {
        if self.budget.fuel > 0 {
            self.budget.fuel -= 1;
            return Ok(());
        }
        self.budget.fuel = FUEL_SLICE;
        let elapsed = self.budget.start.elapsed();
        if elapsed >= EXECUTION_LIMIT {
            return Err(ScriptError::new(ERR_TIMEOUT));
        }
        if elapsed >= EXECUTION_WARN && !self.budget.warned {
            self.budget.warned = true;
            self.bridge.log(
                self.script_id,
                LogLevel::Warning,
                "execution time above 5 ms".to_owned(),
            );
        }
        Ok(())
    }

    /// Run a whole chunk. Top-level locals live in a chunk scope, not in the
    /// globals.
    pub fn run_chunk(&mut self, block: &Block) -> SResult<()> {
        let mut env =
            vec![Rc::clone(&self.vm.globals), Rc::new(RefCell::new(HashMap::new()))];
        self.exec_block(block, &mut env)?;
        Ok(())
    }

    /// Call a named global function when it exists.
    pub fn call_global(&mut self, name: &str, args: Vec<Value>) -> SResult<Option<Value>> {
        let func = self.vm.globals.borrow().get(name).cloned();
        match func {
            Some(f @ (Value::Function(_) | Value::Builtin(_))) => {
                let values = self.call_value(f, args)?;
                Ok(Some(values.into_iter().next().unwrap_or(Value::Nil)))
            }
            _ => Ok(None),
        }
    }

    /// Call a registry function (event handler path).
    pub fn call_registered(&mut self, key: u32, args: Vec<Value>) -> SResult<Value> {
        let Some(func) = self.vm.registry.get(&key).cloned() else {
            return Err(ScriptError::new("handler is gone"));
        };
        let values = self.call_value(func, args)?;
        Ok(values.into_iter().next().unwrap_or(Value::Nil))
    }

    // -- statements ----------------------------------------------------------

    fn exec_block(&mut self, block: &Block, env: &mut Vec<Scope>) -> SResult<Flow> {
        for stat in &block.0 {
            self.tick()?;
            match self.exec_stat(stat, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn scoped<T>(
        &mut self,
        env: &mut Vec<Scope>,
        f: impl FnOnce(&mut Self, &mut Vec<Scope>) -> SResult<T>,
    ) -> SResult<T> {
        env.push(Rc::new(RefCell::new(HashMap::new())));
        let result = f(self, env);
        env.pop();
        result
    }

    fn exec_stat(&mut self, stat: &Stat, env: &mut Vec<Scope>) -> SResult<Flow> {
        match stat {
            Stat::Local { names, exprs } => {
                let mut values = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    let value = match exprs.get(i) {
                        Some(e) => self.eval(e, env)?,
                        None => Value::Nil,
                    };
                    values.push((name.clone(), value));
                }
                let scope = env.last().cloned().unwrap_or_else(|| Rc::clone(&self.vm.globals));
                for (name, value) in values {
                    scope.borrow_mut().insert(name, value);
                }
                Ok(Flow::Normal)
            }
            Stat::Assign { targets, exprs, .. } => {
                let mut values = Vec::with_capacity(targets.len());
                for (i, _) in targets.iter().enumerate() {
                    values.push(match exprs.get(i) {
                        Some(e) => self.eval(e, env)?,
                        None => Value::Nil,
                    });
                }
                for (target, value) in targets.iter().zip(values) {
                    self.assign(target, value, env)?;
                }
                Ok(Flow::Normal)
            }
            Stat::Call(expr) => {
                self.eval_multi(expr, env)?;
                Ok(Flow::Normal)
            }
            Stat::Do(block) => self.scoped(env, |this, env| this.exec_block(block, env)),
            Stat::While { cond, body } => {
                loop {
                    self.tick()?;
                    if !self.eval(cond, env)?.truthy() {
                        break;
                    }
                    match self.scoped(env, |this, env| this.exec_block(body, env))? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::Repeat { body, cond } => {
                loop {
                    self.tick()?;
                    match self.scoped(env, |this, env| this.exec_block(body, env))? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    if self.eval(cond, env)?.truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::If { arms, else_body } => {
                for (cond, body) in arms {
                    if self.eval(cond, env)?.truthy() {
                        return self.scoped(env, |this, env| this.exec_block(body, env));
                    }
                }
                if let Some(body) = else_body {
                    return self.scoped(env, |this, env| this.exec_block(body, env));
                }
                Ok(Flow::Normal)
            }
            Stat::NumericFor { var, start, end, step, body } => {
                let start = self
                    .eval(start, env)?
                    .as_number()
                    .ok_or_else(|| ScriptError::new("'for' initial value must be a number"))?;
                let end = self
                    .eval(end, env)?
                    .as_number()
                    .ok_or_else(|| ScriptError::new("'for' limit must be a number"))?;
                let step = match step {
                    Some(e) => self
                        .eval(e, env)?
                        .as_number()
                        .ok_or_else(|| ScriptError::new("'for' step must be a number"))?,
                    None => 1.0,
                };
                if step == 0.0 {
                    return Err(ScriptError::new("'for' step is zero"));
                }
                let mut i = start;
                while (step > 0.0 && i <= end) || (step < 0.0 && i >= end) {
                    self.tick()?;
                    let value = if i.fract() == 0.0 { Value::Int(i as i64) } else { Value::Num(i) };
                    let flow = self.scoped(env, |this, env| {
                        if let Some(scope) = env.last() {
                            scope.borrow_mut().insert(var.clone(), value);
                        }
                        this.exec_block(body, env)
                    })?;
                    match flow {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                    i += step;
                }
                Ok(Flow::Normal)
            }
            Stat::GenericFor { names, exprs, body } => {
                let mut values = Vec::new();
                for (i, expr) in exprs.iter().enumerate() {
                    if i == exprs.len() - 1 {
                        values.extend(self.eval_multi(expr, env)?);
                    } else {
                        values.push(self.eval(expr, env)?);
                    }
                }
                let iter = values.first().cloned().unwrap_or(Value::Nil);
                let state = values.get(1).cloned().unwrap_or(Value::Nil);
                let mut control = values.get(2).cloned().unwrap_or(Value::Nil);
                loop {
                    self.tick()?;
                    let results =
                        self.call_value(iter.clone(), vec![state.clone(), control.clone()])?;
                    let first = results.first().cloned().unwrap_or(Value::Nil);
                    if matches!(first, Value::Nil) {
                        break;
                    }
                    control = first.clone();
                    let flow = self.scoped(env, |this, env| {
                        if let Some(scope) = env.last() {
                            let mut scope = scope.borrow_mut();
                            for (i, name) in names.iter().enumerate() {
                                scope.insert(
                                    name.clone(),
                                    results.get(i).cloned().unwrap_or(Value::Nil),
                                );
                            }
                        }
                        this.exec_block(body, env)
                    })?;
                    match flow {
                        Flow::Normal => {}
                        Flow::Break => break,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stat::Function { target, def } => {
                let closure =
                    Value::Function(Rc::new(Closure { def: Rc::clone(def), env: env.clone() }));
                self.assign(target, closure, env)?;
                Ok(Flow::Normal)
            }
            Stat::LocalFunction { name, def } => {
                let scope = env.last().cloned().unwrap_or_else(|| Rc::clone(&self.vm.globals));
                // Insert first so the function can call itself.
                scope.borrow_mut().insert(name.clone(), Value::Nil);
                let closure =
                    Value::Function(Rc::new(Closure { def: Rc::clone(def), env: env.clone() }));
                scope.borrow_mut().insert(name.clone(), closure);
                Ok(Flow::Normal)
            }
            Stat::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e, env)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stat::Break => Ok(Flow::Break),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &mut Vec<Scope>) -> SResult<()> {
        match target {
            Expr::Name(name) => {
                for scope in env.iter().rev() {
                    if Rc::ptr_eq(scope, &self.vm.globals) {
                        continue;
                    }
                    if scope.borrow().contains_key(name) {
                        scope.borrow_mut().insert(name.clone(), value);
                        return Ok(());
                    }
                }
                if sandbox::is_read_only_global(name) {
                    return Err(ScriptError::new(format!("global {name} is read-only")));
                }
                self.vm.globals.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Expr::Index(object, key) => {
                let object = self.eval(object, env)?;
                let key = self.eval(key, env)?;
                self.set_index(object, key, value)
            }
            _ => Err(ScriptError::new("cannot assign to this expression")),
        }
    }

    // -- expressions ---------------------------------------------------------

    fn eval(&mut self, expr: &Expr, env: &mut Vec<Scope>) -> SResult<Value> {
        Ok(self.eval_multi(expr, env)?.into_iter().next().unwrap_or(Value::Nil))
    }

    fn eval_multi(&mut self, expr: &Expr, env: &mut Vec<Scope>) -> SResult<Vec<Value>> {
        self.tick()?;
        let single = |v: Value| vec![v];
        Ok(match expr {
            Expr::Nil => single(Value::Nil),
            Expr::True => single(Value::Bool(true)),
            Expr::False => single(Value::Bool(false)),
            Expr::Int(i) => single(Value::Int(*i)),
            Expr::Num(n) => single(Value::Num(*n)),
            Expr::Str(s) => single(Value::str(s)),
            Expr::Name(name) => {
                for scope in env.iter().rev() {
                    if let Some(v) = scope.borrow().get(name) {
                        return Ok(single(v.clone()));
                    }
                }
                single(self.vm.globals.borrow().get(name).cloned().unwrap_or(Value::Nil))
            }
            Expr::Index(object, key) => {
                let object = self.eval(object, env)?;
                let key = self.eval(key, env)?;
                single(self.get_index(object, key)?)
            }
            Expr::Function(def) => single(Value::Function(Rc::new(Closure {
                def: Rc::clone(def),
                env: env.clone(),
            }))),
            Expr::Table(fields) => {
                let table = Rc::new(RefCell::new(Table::new()));
                let mut position = 0i64;
                for field in fields {
                    match field {
                        TableField::Positional(e) => {
                            position += 1;
                            let v = self.eval(e, env)?;
                            table.borrow_mut().map.insert(Key::Int(position), v);
                        }
                        TableField::Named(name, e) => {
                            let v = self.eval(e, env)?;
                            table.borrow_mut().map.insert(Key::Str(Rc::from(name.as_str())), v);
                        }
                        TableField::Indexed(k, e) => {
                            let k = self.eval(k, env)?;
                            let v = self.eval(e, env)?;
                            let key = Key::from_value(&k).ok_or_else(|| {
                                ScriptError::new("invalid table key")
                            })?;
                            table.borrow_mut().map.insert(key, v);
                        }
                    }
                }
                single(Value::Table(table))
            }
            Expr::Call { func, args, .. } => {
                let f = self.eval(func, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, env)?);
                }
                self.call_value(f, values)?
            }
            Expr::MethodCall { object, name, args, .. } => {
                let receiver = self.eval(object, env)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, env)?);
                }
                self.method_call(receiver, name, values)?
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinOp::And => {
                    let l = self.eval(lhs, env)?;
                    if l.truthy() {
                        single(self.eval(rhs, env)?)
                    } else {
                        single(l)
                    }
                }
                BinOp::Or => {
                    let l = self.eval(lhs, env)?;
                    if l.truthy() {
                        single(l)
                    } else {
                        single(self.eval(rhs, env)?)
                    }
                }
                _ => {
                    let l = self.eval(lhs, env)?;
                    let r = self.eval(rhs, env)?;
                    single(self.binary(*op, l, r)?)
                }
            },
            Expr::Unary { op, expr } => {
                let v = self.eval(expr, env)?;
                single(self.unary(*op, v)?)
            }
        })
    }

    fn get_index(&mut self, object: Value, key: Value) -> SResult<Value> {
        match object {
            Value::Table(table) => {
                let key = match Key::from_value(&key) {
                    Some(k) => k,
                    None => return Ok(Value::Nil),
                };
                Ok(table.borrow().map.get(&key).cloned().unwrap_or(Value::Nil))
            }
            Value::Object(id) => {
                let Value::Str(name) = key else {
                    return Err(ScriptError::new("object index must be a string"));
                };
                self.bridge.index_object(&id, &name)
            }
            Value::Nil => Err(ScriptError::new("attempt to index a nil value")),
            other => Err(ScriptError::new(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    fn set_index(&mut self, object: Value, key: Value, value: Value) -> SResult<()> {
        match object {
            Value::Table(table) => {
                let key = Key::from_value(&key)
                    .ok_or_else(|| ScriptError::new("invalid table key"))?;
                if table.borrow().restricted {
                    sandbox::check_persistable(&value)?;
                }
                if matches!(value, Value::Nil) {
                    table.borrow_mut().map.remove(&key);
                } else {
                    table.borrow_mut().map.insert(key, value);
                }
                Ok(())
            }
            Value::Object(id) => {
                let Value::Str(name) = key else {
                    return Err(ScriptError::new("object index must be a string"));
                };
                self.bridge.set_property(&id, &name, value)
            }
            other => Err(ScriptError::new(format!(
                "attempt to index a {} value",
                other.type_name()
            ))),
        }
    }

    pub fn call_value(&mut self, func: Value, args: Vec<Value>) -> SResult<Vec<Value>> {
        self.tick()?;
        match func {
            Value::Function(closure) => {
                if self.depth >= CALL_DEPTH_LIMIT {
                    return Err(ScriptError::new("stack overflow"));
                }
                self.depth += 1;
                let mut env = closure.env.clone();
                let scope: Scope = Rc::new(RefCell::new(HashMap::new()));
                {
                    let mut s = scope.borrow_mut();
                    for (i, param) in closure.def.params.iter().enumerate() {
                        s.insert(param.clone(), args.get(i).cloned().unwrap_or(Value::Nil));
                    }
                }
                env.push(scope);
                let result = self.exec_block(&closure.def.body, &mut env);
                self.depth -= 1;
                match result? {
                    Flow::Return(v) => Ok(vec![v]),
                    _ => Ok(vec![Value::Nil]),
                }
            }
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            Value::Method { object, method } => self.bridge
                .call_method(&object, &method, &args)
                .map(|v| vec![v]),
            other => Err(ScriptError::new(format!(
                "attempt to call a {} value",
                other.type_name()
            ))),
        }
    }

    fn method_call(&mut self, receiver: Value, name: &str, args: Vec<Value>) -> SResult<Vec<Value>> {
        match &receiver {
            Value::Object(id) => {
                self.bridge.call_method(id, name, &args).map(|v| vec![v])
            }
            Value::Event { object, event } => match name {
                "connect" => {
                    let func = args
                        .first()
                        .cloned()
                        .filter(|v| matches!(v, Value::Function(_) | Value::Builtin(_)))
                        .ok_or_else(|| ScriptError::new("connect expects a function"))?;
                    let func_key = self.vm.register(func);
                    let user_key = match args.get(1) {
                        Some(Value::Nil) | None => None,
                        Some(v) => Some(self.vm.register(v.clone())),
                    };
                    let handle = self.bridge.connect_event(
                        self.script_id,
                        object,
                        event,
                        func_key,
                        user_key,
                    )?;
                    Ok(vec![Value::Int(handle)])
                }
                "disconnect" => {
                    let handle = args
                        .first()
                        .and_then(Value::as_int)
                        .ok_or_else(|| ScriptError::new("disconnect expects a handle"))?;
                    Ok(vec![Value::Bool(self.bridge.disconnect_event(handle))])
                }
                _ => Err(ScriptError::new(format!("unknown event method {name}"))),
            },
            Value::Table(table) => {
                let member = table
                    .borrow()
                    .map
                    .get(&Key::Str(Rc::from(name)))
                    .cloned()
                    .unwrap_or(Value::Nil);
                let mut full_args = vec![receiver.clone()];
                full_args.extend(args);
                self.call_value(member, full_args)
            }
            Value::Str(_) => {
                let builtin = match name {
                    "byte" => Builtin::StringByte,
                    "find" => Builtin::StringFind,
                    "format" => Builtin::StringFormat,
                    "len" => Builtin::StringLen,
                    "lower" => Builtin::StringLower,
                    "rep" => Builtin::StringRep,
                    "reverse" => Builtin::StringReverse,
                    "sub" => Builtin::StringSub,
                    "upper" => Builtin::StringUpper,
                    _ => return Err(ScriptError::new(format!("unknown string method {name}"))),
                };
                let mut full_args = vec![receiver.clone()];
                full_args.extend(args);
                self.call_builtin(builtin, full_args)
            }
            other => Err(ScriptError::new(format!(
                "attempt to call method on a {} value",
                other.type_name()
            ))),
        }
    }

    fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> SResult<Value> {
        use BinOp::*;

        // Set algebra: union, intersection, difference.
        if let (
            &Value::Set { type_name: ta, bits: ba },
            &Value::Set { type_name: tb, bits: bb },
        ) = (&lhs, &rhs)
        {
            if ta == tb {
                let bits = match op {
                    Add => Some(ba | bb),
                    Mul => Some(ba & bb),
                    Sub => Some(ba & !bb),
                    Eq => return Ok(Value::Bool(lhs.script_eq(&rhs))),
                    NotEq => return Ok(Value::Bool(!lhs.script_eq(&rhs))),
                    _ => None,
                };
                if let Some(bits) = bits {
                    return Ok(Value::Set { type_name: ta, bits });
                }
            }
        }

        match op {
            Eq => return Ok(Value::Bool(lhs.script_eq(&rhs))),
            NotEq => return Ok(Value::Bool(!lhs.script_eq(&rhs))),
            Concat => {
                let render = |v: &Value| -> SResult<String> {
                    match v {
                        Value::Str(_) | Value::Int(_) | Value::Num(_) => Ok(v.display()),
                        other => Err(ScriptError::new(format!(
                            "attempt to concatenate a {} value",
                            other.type_name()
                        ))),
                    }
                };
                return Ok(Value::str(format!("{}{}", render(&lhs)?, render(&rhs)?)));
            }
            _ => {}
        }

        if matches!(op, Less | LessEq | Greater | GreaterEq) {
            if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
                let r = match op {
                    Less => a < b,
                    LessEq => a <= b,
                    Greater => a > b,
                    _ => a >= b,
                };
                return Ok(Value::Bool(r));
            }
        }

        let a = lhs.as_number().ok_or_else(|| {
            ScriptError::new(format!("arithmetic on a {} value", lhs.type_name()))
        })?;
        let b = rhs.as_number().ok_or_else(|| {
            ScriptError::new(format!("arithmetic on a {} value", rhs.type_name()))
        })?;
        let both_int = matches!((&lhs, &rhs), (Value::Int(_), Value::Int(_)));

        Ok(match op {
            Add | Sub | Mul | Mod if both_int => {
                let (x, y) = (a as i64, b as i64);
                let v = match op {
                    Add => x.wrapping_add(y),
                    Sub => x.wrapping_sub(y),
                    Mul => x.wrapping_mul(y),
                    _ => {
                        if y == 0 {
                            return Err(ScriptError::new("attempt to perform 'n%%0'"));
                        }
                        x.rem_euclid(y)
                    }
                };
                Value::Int(v)
            }
            Add => Value::Num(a + b),
            Sub => Value::Num(a - b),
            Mul => Value::Num(a * b),
            Div => Value::Num(a / b),
            Mod => Value::Num(a - (a / b).floor() * b),
            Pow => Value::Num(a.powf(b)),
            Less => Value::Bool(a < b),
            LessEq => Value::Bool(a <= b),
            Greater => Value::Bool(a > b),
            GreaterEq => Value::Bool(a >= b),
            And | Or | Eq | NotEq | Concat => {
                return Err(ScriptError::new("unreachable operator"))
            }
        })
    }

    fn unary(&mut self, op: UnOp, value: Value) -> SResult<Value> {
        match op {
            UnOp::Not => Ok(Value::Bool(!value.truthy())),
            UnOp::Neg => match value {
                Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
                Value::Num(n) => Ok(Value::Num(-n)),
                Value::Set { type_name, bits } => Ok(Value::Set {
                    type_name,
                    bits: sandbox::set_mask(type_name) & !bits,
                }),
                other => Err(ScriptError::new(format!(
                    "attempt to negate a {} value",
                    other.type_name()
                ))),
            },
            UnOp::Len => match &value {
                Value::Str(s) => Ok(Value::Int(s.len() as i64)),
                Value::Table(t) => Ok(Value::Int(t.borrow().sequence_len())),
                other => Err(ScriptError::new(format!(
                    "attempt to get length of a {} value",
                    other.type_name()
                ))),
            },
        }
    }

    // -- builtins ------------------------------------------------------------

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> SResult<Vec<Value>> {
        use Builtin::*;
        let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Nil);
        let log_level = |b: Builtin| match b {
            LogDebug => LogLevel::Debug,
            LogInfo => LogLevel::Info,
            LogNotice => LogLevel::Notice,
            LogWarning => LogLevel::Warning,
            LogError => LogLevel::Error,
            LogCritical => LogLevel::Critical,
            _ => LogLevel::Fatal,
        };
        Ok(match builtin {
            Assert => {
                if !arg(0).truthy() {
                    let message = match arg(1) {
                        Value::Nil => "assertion failed!".to_owned(),
                        other => other.display(),
                    };
                    return Err(ScriptError::new(message));
                }
                args
            }
            Type => vec![Value::str(arg(0).type_name())],
            Tostring => vec![Value::str(arg(0).display())],
            Tonumber => {
                let v = match arg(0) {
                    v @ (Value::Int(_) | Value::Num(_)) => v,
                    Value::Str(s) => {
                        let t = s.trim();
                        if let Ok(i) = t.parse::<i64>() {
                            Value::Int(i)
                        } else if let Ok(n) = t.parse::<f64>() {
                            Value::Num(n)
                        } else {
                            Value::Nil
                        }
                    }
                    _ => Value::Nil,
                };
                vec![v]
            }
            Pairs => {
                let t = arg(0);
                if !matches!(t, Value::Table(_)) {
                    return Err(ScriptError::new("pairs expects a table"));
                }
                vec![Value::Builtin(IterNext), t, Value::Nil]
            }
            Ipairs => {
                let t = arg(0);
                if !matches!(t, Value::Table(_)) {
                    return Err(ScriptError::new("ipairs expects a table"));
                }
                vec![Value::Builtin(IterInext), t, Value::Int(0)]
            }
            Next | IterNext => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("next expects a table"));
                };
                let control = arg(1);
                let table = table.borrow();
                let next = match Key::from_value(&control) {
                    None => table.map.iter().next(),
                    Some(key) => table
                        .map
                        .range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded))
                        .next(),
                };
                match next {
                    Some((k, v)) => vec![k.to_value(), v.clone()],
                    None => vec![Value::Nil],
                }
            }
            IterInext => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("ipairs iterator expects a table"));
                };
                let i = arg(1).as_int().unwrap_or(0) + 1;
                let value = table.borrow().map.get(&Key::Int(i)).cloned();
                match value {
                    Some(v) => vec![Value::Int(i), v],
                    None => vec![Value::Nil],
                }
            }
            LogDebug | LogInfo | LogNotice | LogWarning | LogError | LogCritical | LogFatal => {
                // `log:level(...)` passes the log table as arg 0; skip it.
                let parts: Vec<String> = args
                    .iter()
                    .skip(usize::from(matches!(args.first(), Some(Value::Table(_)))))
                    .map(Value::display)
                    .collect();
                let level = log_level(builtin);
                self.bridge.log(self.script_id, level, parts.join(" "));
                vec![Value::Nil]
            }
            StringLen => vec![Value::Int(arg(0).display().len() as i64)],
            StringLower => vec![Value::str(arg(0).display().to_lowercase())],
            StringUpper => vec![Value::str(arg(0).display().to_uppercase())],
            StringReverse => {
                vec![Value::str(arg(0).display().chars().rev().collect::<String>())]
            }
            StringRep => {
                let n = arg(1).as_int().unwrap_or(0).max(0) as usize;
                vec![Value::str(arg(0).display().repeat(n))]
            }
            StringSub => {
                let s = arg(0).display();
                let len = s.len() as i64;
                let norm = |i: i64| -> i64 {
                    if i < 0 {
                        (len + i + 1).max(1)
                    } else if i == 0 {
                        1
                    } else {
                        i
                    }
                };
                let from = norm(arg(1).as_int().unwrap_or(1));
                let to = match arg(2) {
                    Value::Nil => len,
                    v => norm(v.as_int().unwrap_or(-1)).min(len),
                };
                let out = if from > to {
                    String::new()
                } else {
                    s.chars().skip(from as usize - 1).take((to - from + 1) as usize).collect()
                };
                vec![Value::str(out)]
            }
            StringByte => {
                let s = arg(0).display();
                let i = arg(1).as_int().unwrap_or(1).max(1) as usize;
                match s.as_bytes().get(i - 1) {
                    Some(b) => vec![Value::Int(i64::from(*b))],
                    None => vec![Value::Nil],
                }
            }
            StringChar => {
                let mut out = String::new();
                for v in &args {
                    let b = v
                        .as_int()
                        .and_then(|i| u8::try_from(i).ok())
                        .ok_or_else(|| ScriptError::new("char expects byte values"))?;
                    out.push(b as char);
                }
                vec![Value::str(out)]
            }
            StringFind => {
                let s = arg(0).display();
                let needle = arg(1).display();
                match s.find(&needle) {
                    Some(pos) => vec![
                        Value::Int(pos as i64 + 1),
                        Value::Int((pos + needle.len()) as i64),
                    ],
                    None => vec![Value::Nil],
                }
            }
            StringFormat => {
                vec![Value::str(sandbox::simple_format(&arg(0).display(), &args[1..])?)]
            }
            MathAbs => match arg(0) {
                Value::Int(i) => vec![Value::Int(i.wrapping_abs())],
                v => vec![Value::Num(
                    v.as_number()
                        .ok_or_else(|| ScriptError::new("abs expects a number"))?
                        .abs(),
                )],
            },
            MathCeil => vec![Value::Int(
                arg(0)
                    .as_number()
                    .ok_or_else(|| ScriptError::new("ceil expects a number"))?
                    .ceil() as i64,
            )],
            MathFloor => vec![Value::Int(
                arg(0)
                    .as_number()
                    .ok_or_else(|| ScriptError::new("floor expects a number"))?
                    .floor() as i64,
            )],
            MathSqrt => vec![Value::Num(
                arg(0)
                    .as_number()
                    .ok_or_else(|| ScriptError::new("sqrt expects a number"))?
                    .sqrt(),
            )],
            MathMax | MathMin => {
                let mut best: Option<f64> = None;
                let mut best_value = Value::Nil;
                for v in &args {
                    let n = v
                        .as_number()
                        .ok_or_else(|| ScriptError::new("max/min expect numbers"))?;
                    let better = match best {
                        None => true,
                        Some(b) => {
                            if builtin == MathMax {
                                n > b
                            } else {
                                n < b
                            }
                        }
                    };
                    if better {
                        best = Some(n);
                        best_value = v.clone();
                    }
                }
                vec![best_value]
            }
            MathTointeger => match arg(0).as_int() {
                Some(i) => vec![Value::Int(i)],
                None => vec![Value::Nil],
            },
            MathType => match arg(0) {
                Value::Int(_) => vec![Value::str("integer")],
                Value::Num(_) => vec![Value::str("float")],
                _ => vec![Value::Nil],
            },
            TableConcat => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("concat expects a table"));
                };
                let sep = match arg(1) {
                    Value::Nil => String::new(),
                    v => v.display(),
                };
                let table = table.borrow();
                let mut parts = Vec::new();
                let mut i = 1;
                while let Some(v) = table.map.get(&Key::Int(i)) {
                    parts.push(v.display());
                    i += 1;
                }
                vec![Value::str(parts.join(&sep))]
            }
            TableInsert => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("insert expects a table"));
                };
                let value = arg(1);
                let len = table.borrow().sequence_len();
                table.borrow_mut().map.insert(Key::Int(len + 1), value);
                vec![Value::Nil]
            }
            TableRemove => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("remove expects a table"));
                };
                let len = table.borrow().sequence_len();
                if len == 0 {
                    return Ok(vec![Value::Nil]);
                }
                let pos = arg(1).as_int().unwrap_or(len);
                let mut t = table.borrow_mut();
                let removed = t.map.remove(&Key::Int(pos)).unwrap_or(Value::Nil);
                for i in pos + 1..=len {
                    if let Some(v) = t.map.remove(&Key::Int(i)) {
                        t.map.insert(Key::Int(i - 1), v);
                    }
                }
                vec![removed]
            }
            TableUnpack => {
                let Value::Table(table) = arg(0) else {
                    return Err(ScriptError::new("unpack expects a table"));
                };
                let table = table.borrow();
                let mut out = Vec::new();
                let mut i = 1;
                while let Some(v) = table.map.get(&Key::Int(i)) {
                    out.push(v.clone());
                    i += 1;
                }
                out
            }
        })
    }
}

#[cfg(test)]
#[path = "interp_tests.rs"]
mod tests;
