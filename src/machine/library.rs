//! Native implementations of the `lib/*` primitives
//!
//! Each primitive reads its arguments from the channel it was called with.
//! Addresses in arguments are bare storage keys (`s12`, `h3`); function
//! references are full function ids.

use tracing::trace;

use super::{Machine, RuntimeValue};
use crate::ast::BinaryOp;
use crate::compiler::{BREAK, NORMAL, Primitive, RETURN, Storage};
use crate::error::MachineError;
use crate::value::{self, Constant, Kind, Nbt, number_to_string};

/// Bound on prototype chains and nested arrays, which may be cyclic
const MAX_CHAIN: usize = 64;

/// Channel scheduled functions are invoked with
const SCHEDULE_CHANNEL: &str = "sched";

/// Arguments of a primitive call
struct Args {
    channel: String,
    entries: Nbt,
}

impl Args {
    fn get(&self, key: &str) -> Option<&Nbt> {
        self.entries.get(key)
    }

    fn str(&self, key: &str) -> Result<&str, MachineError> {
        self.get(key).and_then(Nbt::as_str).ok_or_else(|| {
            MachineError::storage(
                format!("{}.{}", self.channel, key),
                "missing string argument",
            )
        })
    }
}

impl Machine {
    pub(super) fn call_primitive(
        &mut self,
        primitive: Primitive,
        channel: Option<&str>,
    ) -> Result<i32, MachineError> {
        let channel = channel.unwrap_or_default();
        let args = Args {
            channel: channel.to_string(),
            entries: self
                .storage
                .channels
                .get(channel)
                .cloned()
                .unwrap_or_default(),
        };

        match primitive {
            Primitive::Add => self.binary_primitive(&args, |l, r| value::add(&l, &r)),
            Primitive::Subtract => self.binary_primitive(&args, |l, r| {
                Constant::Number(l.to_number() - r.to_number())
            }),
            Primitive::MathOperation | Primitive::NumberCompare => {
                let op = operator(&args)?;
                self.binary_primitive(&args, |l, r| {
                    value::binary(op, &l, &r).unwrap_or(Constant::Undefined)
                })
            }
            Primitive::Equals => self.equals(&args),
            Primitive::ToNumber => {
                let value = self.value_arg(&args, "value")?;
                let number = self.to_primitive(&value).to_number();
                self.set_slot(args.str("result")?, Constant::Number(number).to_slot())?;
                Ok(NORMAL)
            }
            Primitive::SingleQuoteConcat => self.binary_primitive(&args, |l, r| {
                Constant::String(format!("{}{}", l.to_js_string(), r.to_js_string()))
            }),

            Primitive::GetMember => {
                let object = self.value_arg(&args, "object")?;
                let result = self.member(&object, args.str("property")?);
                self.set_slot(args.str("result")?, result)?;
                Ok(NORMAL)
            }
            Primitive::ComputedMember => {
                let object = self.value_arg(&args, "object")?;
                let key = self.value_arg(&args, "property")?;
                let key = self.property_key(&key);
                let result = self.member(&object, &key);
                self.set_slot(args.str("result")?, result)?;
                Ok(NORMAL)
            }
            Primitive::PrototypeMember => {
                let result = match args.get("prototype").and_then(Nbt::as_str) {
                    Some(prototype) => self.lookup(prototype, args.str("property")?),
                    None => Nbt::undefined_slot(),
                };
                self.set_slot(args.str("result")?, result)?;
                Ok(NORMAL)
            }
            Primitive::SetMember => self.set_member(&args),
            Primitive::Allocate => self.allocate(&args),
            Primitive::SetClassPrototype => self.set_class_prototype(&args),

            Primitive::LoopArray => self.loop_array(&args),
            Primitive::CallFunction => {
                let callee = self.slot(args.str("function")?);
                self.invoke_function(&callee, args.str("channel")?)
            }
            Primitive::BindFunction => self.bind_function(&args),
            Primitive::SetVariable => {
                let target = args.str("target")?;
                if !target.is_empty() {
                    let source = self.slot(args.str("source")?);
                    self.set_slot(target, source)?;
                }
                Ok(NORMAL)
            }

            Primitive::InitPromise => {
                if let RuntimeValue::Reference(_, address) = self.value_arg(&args, "promise")? {
                    self.write_path(Storage::Heap, &[address.as_str(), "promise"], pending_promise())?;
                }
                Ok(NORMAL)
            }
            Primitive::ResolvePromise => self.resolve_promise(&args),
            Primitive::AwaitPromise => self.await_promise(&args),

            Primitive::Run => {
                let command = self.value_arg(&args, "command")?;
                let command = self.to_primitive(&command).to_js_string();
                self.command(&command);
                Ok(NORMAL)
            }
            Primitive::Schedule => {
                let function = self.slot(args.str("function")?);
                let ticks = self.value_arg(&args, "ticks")?;
                let ticks = self.to_primitive(&ticks).to_number();
                if let Some(id) = function.get("function").and_then(Nbt::as_str) {
                    self.unit_of(id)?;
                    let ticks = if ticks.is_finite() && ticks > 1.0 {
                        ticks.ceil() as u64
                    } else {
                        1
                    };
                    self.schedule(function, ticks);
                }
                Ok(NORMAL)
            }
        }
    }

    // ============ VALUES ============

    fn set_slot(&mut self, key: &str, slot: Nbt) -> Result<(), MachineError> {
        self.write_root(Storage::Slots, key, slot)
    }

    /// Decoded slot whose key is the argument `key`
    fn value_arg(&self, args: &Args, key: &str) -> Result<RuntimeValue, MachineError> {
        Ok(RuntimeValue::decode(&self.slot(args.str(key)?)))
    }

    /// `left` and `right` as primitives, combined into `result`
    fn binary_primitive(
        &mut self,
        args: &Args,
        apply: impl FnOnce(Constant, Constant) -> Constant,
    ) -> Result<i32, MachineError> {
        let left = self.value_arg(args, "left")?;
        let right = self.value_arg(args, "right")?;
        let result = apply(self.to_primitive(&left), self.to_primitive(&right));
        self.set_slot(args.str("result")?, result.to_slot())?;
        Ok(NORMAL)
    }

    fn equals(&mut self, args: &Args) -> Result<i32, MachineError> {
        let op = operator(args)?;
        let left = self.value_arg(args, "left")?;
        let right = self.value_arg(args, "right")?;
        let strict = matches!(op, BinaryOp::StrictEq | BinaryOp::StrictNotEq);
        let negate = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);

        let equal = match (&left, &right) {
            (RuntimeValue::Reference(..), RuntimeValue::Reference(..)) => left == right,
            (RuntimeValue::Primitive(l), RuntimeValue::Primitive(r)) => {
                if strict {
                    l.raw_equals(r)
                } else {
                    value::loose_equals(l, r)
                }
            }
            (RuntimeValue::Reference(..), RuntimeValue::Primitive(primitive))
            | (RuntimeValue::Primitive(primitive), RuntimeValue::Reference(..)) => {
                let nullish = matches!(primitive, Constant::Undefined | Constant::Null);
                if strict || nullish {
                    false
                } else {
                    let reference = if let RuntimeValue::Reference(..) = left {
                        &left
                    } else {
                        &right
                    };
                    value::loose_equals(&self.to_primitive(reference), primitive)
                }
            }
        };
        self.set_slot(
            args.str("result")?,
            Constant::Boolean(equal != negate).to_slot(),
        )?;
        Ok(NORMAL)
    }

    /// ToPrimitive: objects become `[object Object]`, arrays join their elements
    pub(super) fn to_primitive(&self, value: &RuntimeValue) -> Constant {
        self.to_primitive_bounded(value, 0)
    }

    fn to_primitive_bounded(&self, value: &RuntimeValue, depth: usize) -> Constant {
        match value {
            RuntimeValue::Primitive(constant) => constant.clone(),
            RuntimeValue::Reference(Kind::Array, address) if depth < MAX_CHAIN => {
                let joined = self
                    .elements(address)
                    .iter()
                    .map(|element| match RuntimeValue::decode(element) {
                        RuntimeValue::Primitive(Constant::Undefined | Constant::Null) => {
                            String::new()
                        }
                        other => self.to_primitive_bounded(&other, depth + 1).to_js_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                Constant::String(joined)
            }
            RuntimeValue::Reference(Kind::Function, _) => Constant::String("function".to_string()),
            RuntimeValue::Reference(..) => Constant::String("[object Object]".to_string()),
        }
    }

    /// Property name a computed key stands for
    fn property_key(&self, key: &RuntimeValue) -> String {
        match self.to_primitive(key) {
            Constant::Number(n) => number_to_string(n),
            other => other.to_js_string(),
        }
    }

    // ============ HEAP ============

    fn record(&self, address: &str) -> Option<&Nbt> {
        self.storage.heap.get(address)
    }

    fn elements(&self, address: &str) -> Vec<Nbt> {
        self.record(address)
            .and_then(|record| record.get("elements"))
            .and_then(Nbt::as_list)
            .cloned()
            .unwrap_or_default()
    }

    /// Property lookup through the prototype chain
    fn lookup(&self, address: &str, property: &str) -> Nbt {
        let mut current = address.to_string();
        for _ in 0..MAX_CHAIN {
            let Some(record) = self.record(&current) else {
                break;
            };
            if let Some(found) = record.get_path(&["props", property]) {
                return found.clone();
            }
            match record.get("prototype").and_then(Nbt::as_str) {
                Some(next) => current = next.to_string(),
                None => break,
            }
        }
        Nbt::undefined_slot()
    }

    fn member(&self, object: &RuntimeValue, property: &str) -> Nbt {
        match object {
            RuntimeValue::Reference(Kind::Array, address) => {
                let elements = self.elements(address);
                if property == "length" {
                    return Constant::Number(elements.len() as f64).to_slot();
                }
                property
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| elements.get(index).cloned())
                    .unwrap_or_else(Nbt::undefined_slot)
            }
            RuntimeValue::Reference(_, address) => self.lookup(address, property),
            RuntimeValue::Primitive(Constant::String(s)) => {
                if property == "length" {
                    return Constant::Number(s.chars().count() as f64).to_slot();
                }
                property
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| s.chars().nth(index))
                    .map(|ch| Constant::String(ch.to_string()).to_slot())
                    .unwrap_or_else(Nbt::undefined_slot)
            }
            RuntimeValue::Primitive(_) => Nbt::undefined_slot(),
        }
    }

    fn set_member(&mut self, args: &Args) -> Result<i32, MachineError> {
        let object = self.value_arg(args, "object")?;
        let property = match args.get("property").and_then(Nbt::as_str) {
            Some(property) => property.to_string(),
            None => {
                let key = self.value_arg(args, "key")?;
                self.property_key(&key)
            }
        };
        let value = self.slot(args.str("value")?);

        match object {
            RuntimeValue::Reference(Kind::Array, address) => {
                let Ok(index) = property.parse::<usize>() else {
                    trace!(%property, "non-index array write ignored");
                    return Ok(NORMAL);
                };
                let mut elements = self.elements(&address);
                if elements.len() <= index {
                    elements.resize(index + 1, Nbt::undefined_slot());
                }
                if let Some(element) = elements.get_mut(index) {
                    *element = value;
                }
                self.write_path(Storage::Heap, &[address.as_str(), "elements"], Nbt::List(elements))?;
            }
            RuntimeValue::Reference(_, address) if !address.is_empty() => {
                self.write_path(Storage::Heap, &[address.as_str(), "props", property.as_str()], value)?;
            }
            _ => trace!(%property, "property write on a primitive ignored"),
        }
        Ok(NORMAL)
    }

    fn allocate(&mut self, args: &Args) -> Result<i32, MachineError> {
        let kind = args
            .get("kind")
            .and_then(Nbt::as_str)
            .and_then(Kind::parse)
            .unwrap_or(Kind::Object);
        let address = format!("h{}", self.next_heap);
        self.next_heap += 1;

        let mut record = Nbt::compound();
        if kind == Kind::Array {
            record.set_path(&["type"], Nbt::String(Kind::Array.as_str().to_string()));
            record.set_path(&["elements"], Nbt::List(Vec::new()));
        } else {
            record.set_path(&["props"], Nbt::compound());
            if let Some(prototype) = args.get("prototype").and_then(Nbt::as_str) {
                record.set_path(&["prototype"], Nbt::String(prototype.to_string()));
            }
        }
        self.write_root(Storage::Heap, &address, record)?;
        self.set_slot(
            args.str("result")?,
            Nbt::slot(kind, Nbt::String(address), None),
        )?;
        Ok(NORMAL)
    }

    /// Link a class prototype record to its parent class's prototype
    fn set_class_prototype(&mut self, args: &Args) -> Result<i32, MachineError> {
        let prototype = args.str("prototype")?.to_string();
        let parent = self.value_arg(args, "parent")?;
        let RuntimeValue::Reference(_, parent_address) = parent else {
            return Ok(NORMAL);
        };
        let parent_proto = self
            .record(&parent_address)
            .and_then(|record| record.get_path(&["props", "prototype", "value"]))
            .and_then(Nbt::as_str)
            .map(str::to_string);
        if let Some(parent_proto) = parent_proto {
            self.write_path(
                Storage::Heap,
                &[prototype.as_str(), "prototype"],
                Nbt::String(parent_proto),
            )?;
        }
        Ok(NORMAL)
    }

    // ============ CONTROL ============

    /// Invoke the body unit once per element; `BREAK` stops the loop, `RETURN` is relayed
    fn loop_array(&mut self, args: &Args) -> Result<i32, MachineError> {
        let RuntimeValue::Reference(Kind::Array, address) = self.value_arg(args, "array")? else {
            return Ok(NORMAL);
        };
        let unit = self.unit_of(args.str("function")?)?;
        let channel = args.str("channel")?.to_string();

        let mut index = 0;
        loop {
            let Some(element) = self.elements(&address).get(index).cloned() else {
                break;
            };
            let mut entries = frame(&channel);
            entries.set_path(&["arg0"], element);
            entries.set_path(&["arg1"], Constant::Number(index as f64).to_slot());
            self.write_root(Storage::Channels, &channel, entries)?;

            match self.execute(&unit, Some(&channel))? {
                BREAK => break,
                RETURN => return Ok(RETURN),
                _ => index += 1,
            }
        }
        Ok(NORMAL)
    }

    fn resolve_promise(&mut self, args: &Args) -> Result<i32, MachineError> {
        let RuntimeValue::Reference(_, address) = self.value_arg(args, "promise")? else {
            return Ok(NORMAL);
        };
        let state = self
            .record(&address)
            .and_then(|record| record.get("promise"))
            .cloned()
            .unwrap_or_else(pending_promise);
        if state.get("resolved").and_then(Nbt::as_bool) == Some(true) {
            return Ok(NORMAL);
        }

        let value = self.slot(args.str("value")?);
        let listeners = state
            .get("listeners")
            .and_then(Nbt::as_list)
            .cloned()
            .unwrap_or_default();

        let mut settled = Nbt::compound();
        settled.set_path(&["listeners"], Nbt::List(Vec::new()));
        settled.set_path(&["resolved"], Nbt::Bool(true));
        settled.set_path(&["value"], value.clone());
        self.write_path(Storage::Heap, &[address.as_str(), "promise"], settled)?;

        let channel = args.str("channel")?;
        for listener in listeners {
            self.call_listener(&listener, value.clone(), channel)?;
        }
        Ok(NORMAL)
    }

    /// Run `listener` once the promise settles, or now when it already has
    fn await_promise(&mut self, args: &Args) -> Result<i32, MachineError> {
        let awaited = self.slot(args.str("promise")?);
        let listener = self.slot(args.str("listener")?);
        let channel = args.str("channel")?;

        let state = match RuntimeValue::decode(&awaited) {
            RuntimeValue::Reference(Kind::Object, address) => self
                .record(&address)
                .and_then(|record| record.get("promise"))
                .cloned()
                .map(|state| (address, state)),
            _ => None,
        };

        match state {
            Some((address, state)) => {
                if state.get("resolved").and_then(Nbt::as_bool) == Some(true) {
                    let value = state.get("value").cloned().unwrap_or_else(Nbt::undefined_slot);
                    self.call_listener(&listener, value, channel)?;
                } else {
                    self.append_path(Storage::Heap, &[address.as_str(), "promise", "listeners"], listener)?;
                }
            }
            // Awaiting a plain value continues with the value itself
            None => self.call_listener(&listener, awaited, channel)?,
        }
        Ok(NORMAL)
    }

    fn call_listener(&mut self, listener: &Nbt, value: Nbt, channel: &str) -> Result<(), MachineError> {
        let mut entries = frame(channel);
        entries.set_path(&["arg0"], value);
        self.write_root(Storage::Channels, channel, entries)?;
        self.invoke_function(listener, channel)?;
        Ok(())
    }

    pub(super) fn run_scheduled(&mut self, function: &Nbt) -> Result<(), MachineError> {
        self.write_root(Storage::Channels, SCHEDULE_CHANNEL, frame(SCHEDULE_CHANNEL))?;
        self.invoke_function(function, SCHEDULE_CHANNEL)?;
        Ok(())
    }

    /// Execute a function value with a filled channel. A bound function gets
    /// its recorded `this` whatever the caller passed.
    fn invoke_function(&mut self, callee: &Nbt, channel: &str) -> Result<i32, MachineError> {
        let Some(function) = callee
            .get("function")
            .and_then(Nbt::as_str)
            .filter(|function| !function.is_empty())
        else {
            trace!(callee = ?callee, "call of a non-function ignored");
            return Ok(NORMAL);
        };
        let unit = self.unit_of(function)?;
        if let RuntimeValue::Reference(Kind::Function, address) = RuntimeValue::decode(callee) {
            let bound = self
                .record(&address)
                .and_then(|record| record.get("bound"))
                .cloned();
            if let Some(bound) = bound {
                self.write_path(Storage::Channels, &[channel, "this"], bound)?;
            }
        }
        self.execute(&unit, Some(channel))
    }

    /// A function value sharing the unit of `function`, with `this` fixed
    fn bind_function(&mut self, args: &Args) -> Result<i32, MachineError> {
        let callee = self.slot(args.str("function")?);
        let that = self.slot(args.str("that")?);
        let address = format!("h{}", self.next_heap);
        self.next_heap += 1;

        let mut record = Nbt::compound();
        record.set_path(&["props"], Nbt::compound());
        record.set_path(&["bound"], that);
        self.write_root(Storage::Heap, &address, record)?;

        let function = callee.get("function").and_then(Nbt::as_str);
        let bound = Nbt::slot(Kind::Function, Nbt::String(address), function);
        self.set_slot(args.str("result")?, bound)?;
        Ok(NORMAL)
    }

    fn append_path(&mut self, storage: Storage, path: &[&str], value: Nbt) -> Result<(), MachineError> {
        if self.storage.get_mut(storage).append_path(path, value) {
            Ok(())
        } else {
            Err(MachineError::storage(path.join("."), "not a list"))
        }
    }
}

/// Operator carried in the `operation` entry
fn operator(args: &Args) -> Result<BinaryOp, MachineError> {
    let op = args.str("operation")?;
    BinaryOp::parse(op).ok_or_else(|| {
        MachineError::storage(
            format!("{}.operation", args.channel),
            format!("unknown operator '{}'", op),
        )
    })
}

/// A channel compound holding only its own key
fn frame(channel: &str) -> Nbt {
    let mut entries = Nbt::compound();
    entries.set_path(&["frame"], Nbt::String(channel.to_string()));
    entries
}

fn pending_promise() -> Nbt {
    let mut state = Nbt::compound();
    state.set_path(&["listeners"], Nbt::List(Vec::new()));
    state.set_path(&["resolved"], Nbt::Bool(false));
    state.set_path(&["value"], Nbt::undefined_slot());
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ChannelId, Guard, Instr, Operand, Place, Program, SlotId, Target};
    use crate::compiler::{Unit, UnitKind, UnitMeta};
    use crate::value::FxIndexMap;

    /// A program with one unit running `instrs`
    fn program(instrs: Vec<Instr>) -> Program {
        let mut units = FxIndexMap::default();
        units.insert(
            "main".to_string(),
            Unit {
                name: "main".to_string(),
                meta: UnitMeta {
                    kind: UnitKind::Script,
                    is_async: false,
                    that: None,
                    super_class: None,
                    scope_chain: vec![0],
                },
                instrs,
            },
        );
        Program {
            namespace: "t".to_string(),
            entry: "main".to_string(),
            units,
            functions: FxIndexMap::default(),
            globals: FxIndexMap::default(),
            heap_base: 0,
        }
    }

    fn set(slot: u32, constant: Constant) -> Instr {
        Instr::Set {
            guard: Guard::always(),
            dst: Place::slot(SlotId(slot)),
            src: Operand::Literal(constant.to_slot()),
        }
    }

    /// Fill channel `c0` and call `primitive` with it
    fn call(primitive: Primitive, entries: &[(&str, &str)]) -> Vec<Instr> {
        let mut instrs = vec![Instr::Set {
            guard: Guard::always(),
            dst: Place::channel(ChannelId(0), None),
            src: Operand::Literal(frame("c0")),
        }];
        for (entry, value) in entries {
            instrs.push(Instr::Set {
                guard: Guard::always(),
                dst: Place::channel(ChannelId(0), Some(*entry)),
                src: Operand::string(*value),
            });
        }
        instrs.push(Instr::Invoke {
            guard: Guard::always(),
            target: Target::Library(primitive),
            channel: Some(ChannelId(0)),
            store: None,
        });
        instrs
    }

    fn run(instrs: Vec<Instr>) -> Machine {
        let mut machine = Machine::new(program(instrs));
        let result = machine.run_entry();
        assert_eq!(result, Ok(()));
        machine
    }

    fn slot_value(machine: &Machine, key: &str) -> RuntimeValue {
        RuntimeValue::decode(&machine.slot(key))
    }

    #[test]
    fn test_add_concatenates_strings() {
        let mut instrs = vec![set(1, Constant::from("a")), set(2, Constant::Number(1.0))];
        instrs.extend(call(
            Primitive::Add,
            &[("left", "s1"), ("right", "s2"), ("result", "s3")],
        ));
        let machine = run(instrs);
        assert_eq!(
            slot_value(&machine, "s3"),
            RuntimeValue::Primitive(Constant::from("a1"))
        );
    }

    #[test]
    fn test_equals_operations() {
        let mut instrs = vec![set(1, Constant::from("1")), set(2, Constant::Number(1.0))];
        instrs.extend(call(
            Primitive::Equals,
            &[("left", "s1"), ("right", "s2"), ("result", "s3"), ("operation", "==")],
        ));
        instrs.extend(call(
            Primitive::Equals,
            &[("left", "s1"), ("right", "s2"), ("result", "s4"), ("operation", "===")],
        ));
        let machine = run(instrs);
        assert_eq!(
            slot_value(&machine, "s3"),
            RuntimeValue::Primitive(Constant::Boolean(true))
        );
        assert_eq!(
            slot_value(&machine, "s4"),
            RuntimeValue::Primitive(Constant::Boolean(false))
        );
    }

    #[test]
    fn test_member_lookup_follows_prototype() {
        let mut instrs = call(Primitive::Allocate, &[("result", "s1"), ("kind", "object")]);
        instrs.push(set(2, Constant::Number(7.0)));
        instrs.extend(call(
            Primitive::SetMember,
            &[("object", "s1"), ("property", "x"), ("value", "s2")],
        ));
        // s3 is an object whose prototype is the record behind s1
        instrs.extend(call(
            Primitive::Allocate,
            &[("result", "s3"), ("kind", "object"), ("prototype", "h0")],
        ));
        instrs.extend(call(
            Primitive::GetMember,
            &[("object", "s3"), ("property", "x"), ("result", "s4")],
        ));
        let machine = run(instrs);
        assert_eq!(
            slot_value(&machine, "s4"),
            RuntimeValue::Primitive(Constant::Number(7.0))
        );
    }

    #[test]
    fn test_array_members() {
        let mut instrs = call(Primitive::Allocate, &[("result", "s1"), ("kind", "array")]);
        instrs.push(set(2, Constant::from("b")));
        instrs.extend(call(
            Primitive::SetMember,
            &[("object", "s1"), ("property", "1"), ("value", "s2")],
        ));
        instrs.extend(call(
            Primitive::GetMember,
            &[("object", "s1"), ("property", "length"), ("result", "s3")],
        ));
        let machine = run(instrs);
        assert_eq!(
            slot_value(&machine, "s3"),
            RuntimeValue::Primitive(Constant::Number(2.0))
        );
        assert_eq!(machine.display(&machine.slot("s1")), ",b");
    }

    #[test]
    fn test_set_variable_skips_empty_target() {
        let mut instrs = vec![set(1, Constant::Number(3.0))];
        instrs.extend(call(Primitive::SetVariable, &[("target", ""), ("source", "s1")]));
        instrs.extend(call(Primitive::SetVariable, &[("target", "s2"), ("source", "s1")]));
        let machine = run(instrs);
        assert_eq!(
            slot_value(&machine, "s2"),
            RuntimeValue::Primitive(Constant::Number(3.0))
        );
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let mut instrs = vec![set(1, Constant::Number(1.0))];
        instrs.extend(call(
            Primitive::MathOperation,
            &[("left", "s1"), ("right", "s1"), ("result", "s2"), ("operation", "@")],
        ));
        let mut machine = Machine::new(program(instrs));
        assert!(matches!(
            machine.run_entry(),
            Err(MachineError::Storage { .. })
        ));
    }
}
