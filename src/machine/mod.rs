//! Simulator of the target environment
//!
//! Executes a [`Program`] the way the target would: three storages, unit
//! calls with an optional channel, integer return codes. Library primitives
//! are implemented natively (see `library`). Commands emitted verbatim are
//! recorded, and `tellraw` output is collected as text lines.

mod library;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::compiler::{Guard, Instr, NORMAL, Operand, Place, Program, Storage, Target};
use crate::error::MachineError;
use crate::value::{Constant, Kind, Nbt};

/// Deepest unit call chain before execution is aborted
pub const MAX_DEPTH: usize = 512;

/// Channel the machine fills when calling a function from the host
const HOST_CHANNEL: &str = "host";

/// Slot the host call result is written to
const HOST_RESULT: &str = "host_result";

/// A function value waiting for its tick
#[derive(Debug, Clone)]
struct Scheduled {
    due: u64,
    function: Nbt,
}

/// Runtime view of a slot
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeValue {
    Primitive(Constant),
    /// Object, array or function, with the heap address it points to
    Reference(Kind, String),
}

impl RuntimeValue {
    /// Decode a slot compound `{type, value, function}`
    pub fn decode(slot: &Nbt) -> RuntimeValue {
        let kind = slot
            .get("type")
            .and_then(Nbt::as_str)
            .and_then(Kind::parse)
            .unwrap_or(Kind::Undefined);
        let value = slot.get("value");
        let constant = match kind {
            Kind::Undefined => Constant::Undefined,
            Kind::Null => Constant::Null,
            Kind::Boolean => Constant::Boolean(value.and_then(Nbt::as_bool).unwrap_or(false)),
            Kind::Number => Constant::Number(value.and_then(Nbt::as_f64).unwrap_or(f64::NAN)),
            Kind::String => {
                Constant::String(value.and_then(Nbt::as_str).unwrap_or_default().to_string())
            }
            Kind::Object | Kind::Array | Kind::Function => {
                let address = value.and_then(Nbt::as_str).unwrap_or_default();
                return RuntimeValue::Reference(kind, address.to_string());
            }
        };
        RuntimeValue::Primitive(constant)
    }

    pub fn kind(&self) -> Kind {
        match self {
            RuntimeValue::Primitive(constant) => constant.kind(),
            RuntimeValue::Reference(kind, _) => *kind,
        }
    }
}

#[derive(Debug, Default)]
struct Storages {
    slots: Nbt,
    heap: Nbt,
    channels: Nbt,
}

impl Storages {
    fn get(&self, storage: Storage) -> &Nbt {
        match storage {
            Storage::Slots => &self.slots,
            Storage::Heap => &self.heap,
            Storage::Channels => &self.channels,
        }
    }

    fn get_mut(&mut self, storage: Storage) -> &mut Nbt {
        match storage {
            Storage::Slots => &mut self.slots,
            Storage::Heap => &mut self.heap,
            Storage::Channels => &mut self.channels,
        }
    }
}

/// Executes compiled programs
pub struct Machine {
    program: Program,
    units: FxHashMap<String, Rc<[Instr]>>,
    storage: Storages,
    next_heap: u32,
    output: Vec<String>,
    commands: Vec<String>,
    tick: u64,
    scheduled: Vec<Scheduled>,
    depth: usize,
    max_depth: usize,
}

impl Machine {
    pub fn new(program: Program) -> Self {
        let units = program
            .units
            .iter()
            .map(|(name, unit)| (name.clone(), Rc::from(unit.instrs.as_slice())))
            .collect();
        let next_heap = program.heap_base;
        Self {
            program,
            units,
            storage: Storages::default(),
            next_heap,
            output: Vec::new(),
            commands: Vec::new(),
            tick: 0,
            scheduled: Vec::new(),
            depth: 0,
            max_depth: MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Run the load-time unit (prelude and top-level statements)
    pub fn run_entry(&mut self) -> Result<(), MachineError> {
        let entry = self.program.entry.clone();
        debug!(unit = %entry, "running entry unit");
        self.execute(&entry, None)?;
        Ok(())
    }

    /// Call a top-level function with primitive arguments; returns the slot it returned
    pub fn call(&mut self, name: &str, args: &[Constant]) -> Result<Nbt, MachineError> {
        let unit = self
            .program
            .functions
            .get(name)
            .map(|sig| sig.unit.clone())
            .ok_or_else(|| MachineError::UnknownUnit(name.to_string()))?;

        let mut channel = Nbt::compound();
        channel.set_path(&["frame"], Nbt::String(HOST_CHANNEL.to_string()));
        for (index, arg) in args.iter().enumerate() {
            channel.set_path(&[format!("arg{}", index)], arg.to_slot());
        }
        channel.set_path(&["return"], Nbt::String(HOST_RESULT.to_string()));
        self.write_root(Storage::Channels, HOST_CHANNEL, channel)?;
        self.write_root(Storage::Slots, HOST_RESULT, Nbt::undefined_slot())?;

        self.execute(&unit, Some(HOST_CHANNEL))?;
        Ok(self.slot(HOST_RESULT))
    }

    /// Advance the clock, running scheduled functions as they fall due
    pub fn advance_ticks(&mut self, ticks: u64) -> Result<(), MachineError> {
        for _ in 0..ticks {
            self.tick += 1;
            let tick = self.tick;
            let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
                .into_iter()
                .partition(|task| task.due <= tick);
            self.scheduled = pending;
            for task in due {
                trace!(function = ?task.function.get("function"), tick, "scheduled function");
                self.run_scheduled(&task.function)?;
            }
        }
        Ok(())
    }

    /// Run ticks until nothing is scheduled, at most `limit` ticks
    pub fn run_until_idle(&mut self, limit: u64) -> Result<(), MachineError> {
        let mut remaining = limit;
        while !self.scheduled.is_empty() && remaining > 0 {
            self.advance_ticks(1)?;
            remaining -= 1;
        }
        Ok(())
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduled.len()
    }

    /// Text of every `tellraw` so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Every command emitted verbatim or through `run`
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn storage(&self, storage: Storage) -> &Nbt {
        self.storage.get(storage)
    }

    /// Slot of a global binding
    pub fn global(&self, name: &str) -> Option<Nbt> {
        let slot = self.program.globals.get(name)?;
        Some(self.slot(&slot.key()))
    }

    /// Value of a global binding, when it holds a primitive
    pub fn global_constant(&self, name: &str) -> Option<Constant> {
        match RuntimeValue::decode(&self.global(name)?) {
            RuntimeValue::Primitive(constant) => Some(constant),
            RuntimeValue::Reference(..) => None,
        }
    }

    /// ToString of a slot, following references into the heap
    pub fn display(&self, slot: &Nbt) -> String {
        self.to_primitive(&RuntimeValue::decode(slot)).to_js_string()
    }

    // ============ EXECUTION ============

    fn execute(&mut self, unit: &str, channel: Option<&str>) -> Result<i32, MachineError> {
        let instrs = self
            .units
            .get(unit)
            .cloned()
            .ok_or_else(|| MachineError::UnknownUnit(unit.to_string()))?;
        if self.depth >= self.max_depth {
            return Err(MachineError::DepthExceeded(self.max_depth));
        }
        trace!(unit, ?channel, depth = self.depth, "invoke");

        self.depth += 1;
        let result = self.run(&instrs, channel);
        self.depth -= 1;
        result
    }

    fn run(&mut self, instrs: &[Instr], channel: Option<&str>) -> Result<i32, MachineError> {
        for instr in instrs {
            match instr {
                Instr::Set { guard, dst, src } => {
                    if self.holds(guard) {
                        if let Some(value) = self.operand(src, channel) {
                            self.write(dst, value)?;
                        }
                    }
                }
                Instr::Append { dst, src } => {
                    if let Some(value) = self.operand(src, channel) {
                        self.append(dst, value)?;
                    }
                }
                Instr::Invoke {
                    guard,
                    target,
                    channel: with,
                    store,
                } => {
                    if self.holds(guard) {
                        let with = with.map(|c| c.key());
                        let code = self.invoke(target, with.as_deref())?;
                        if let Some(store) = store {
                            self.write(store, Nbt::Int(code))?;
                        }
                    }
                }
                Instr::ReturnIf { guard, code } => {
                    if self.holds(guard) {
                        return Ok(*code);
                    }
                }
                Instr::Return(code) => return Ok(*code),
                Instr::Raw(command) => self.command(command),
            }
        }
        Ok(NORMAL)
    }

    fn invoke(&mut self, target: &Target, channel: Option<&str>) -> Result<i32, MachineError> {
        match target {
            Target::Unit(unit) => self.execute(unit, channel),
            Target::Library(primitive) => {
                trace!(primitive = primitive.as_str(), ?channel, "library call");
                self.call_primitive(*primitive, channel)
            }
        }
    }

    /// Unit name of a fully qualified function id
    fn unit_of(&self, function: &str) -> Result<String, MachineError> {
        function
            .strip_prefix(&self.program.namespace)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::to_string)
            .ok_or_else(|| MachineError::UnknownUnit(function.to_string()))
    }

    fn schedule(&mut self, function: Nbt, ticks: u64) {
        self.scheduled.push(Scheduled {
            due: self.tick + ticks.max(1),
            function,
        });
    }

    /// Execute a command; only `tellraw` and `say` have an effect
    fn command(&mut self, command: &str) {
        trace!(command, "command");
        self.commands.push(command.to_string());
        if let Some(rest) = command.strip_prefix("tellraw ") {
            let component = rest.split_once(' ').map(|(_, c)| c).unwrap_or_default();
            self.output.push(component_text(component));
        } else if let Some(text) = command.strip_prefix("say ") {
            self.output.push(text.to_string());
        }
    }

    // ============ STORAGE ============

    fn holds(&self, guard: &Guard) -> bool {
        guard.tests.iter().all(|test| {
            let matched = self
                .read(&test.place)
                .is_some_and(|actual| matches(actual, &test.value));
            matched != test.negate
        })
    }

    fn operand(&self, src: &Operand, channel: Option<&str>) -> Option<Nbt> {
        match src {
            Operand::Literal(value) => Some(value.clone()),
            Operand::Copy(place) => self.read(place).cloned(),
            Operand::Param(entry) => {
                let channel = channel?;
                self.storage
                    .channels
                    .get_path(&[channel, entry.as_str()])
                    .cloned()
            }
        }
    }

    fn read(&self, place: &Place) -> Option<&Nbt> {
        self.storage
            .get(place.addr.storage())
            .get_path(&full_path(place))
    }

    fn write(&mut self, place: &Place, value: Nbt) -> Result<(), MachineError> {
        let path = full_path(place);
        if self
            .storage
            .get_mut(place.addr.storage())
            .set_path(&path, value)
        {
            Ok(())
        } else {
            Err(MachineError::storage(path.join("."), "not a compound"))
        }
    }

    fn append(&mut self, place: &Place, value: Nbt) -> Result<(), MachineError> {
        let path = full_path(place);
        if self
            .storage
            .get_mut(place.addr.storage())
            .append_path(&path, value)
        {
            Ok(())
        } else {
            Err(MachineError::storage(path.join("."), "not a list"))
        }
    }

    fn write_root(&mut self, storage: Storage, key: &str, value: Nbt) -> Result<(), MachineError> {
        self.write_path(storage, &[key], value)
    }

    fn write_path(&mut self, storage: Storage, path: &[&str], value: Nbt) -> Result<(), MachineError> {
        if self.storage.get_mut(storage).set_path(path, value) {
            Ok(())
        } else {
            Err(MachineError::storage(path.join("."), "not a compound"))
        }
    }

    /// A slot by key; undefined when never written
    fn slot(&self, key: &str) -> Nbt {
        self.storage
            .slots
            .get(key)
            .cloned()
            .unwrap_or_else(Nbt::undefined_slot)
    }
}

fn full_path(place: &Place) -> Vec<String> {
    let mut path = Vec::with_capacity(place.path.len() + 1);
    path.push(place.addr.key());
    path.extend(place.path.iter().cloned());
    path
}

/// Storage comparison of `execute if data`: compounds match on a subset of keys.
/// NaN matches NaN so that a guard can test for it.
fn matches(actual: &Nbt, expected: &Nbt) -> bool {
    match (actual, expected) {
        (Nbt::Double(a), Nbt::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
        (Nbt::Compound(actual), Nbt::Compound(expected)) => expected
            .iter()
            .all(|(key, value)| actual.get(key).is_some_and(|a| matches(a, value))),
        (a, b) => a == b,
    }
}

/// Plain text of a `tellraw` text component
fn component_text(component: &str) -> String {
    fn text_of(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => map
                .get("text")
                .map(text_of)
                .unwrap_or_default(),
            serde_json::Value::Array(items) => items.iter().map(text_of).collect(),
            other => other.to_string(),
        }
    }
    match serde_json::from_str::<serde_json::Value>(component) {
        Ok(value) => text_of(&value),
        Err(_) => component
            .strip_prefix('"')
            .and_then(|c| c.strip_suffix('"'))
            .unwrap_or(component)
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_text() {
        assert_eq!(component_text("\"hi\""), "hi");
        assert_eq!(component_text("{\"text\":\"warn\",\"color\":\"yellow\"}"), "warn");
        assert_eq!(component_text("\"say \"hi\"\""), "say \"hi\"");
    }

    #[test]
    fn test_matches_subset_and_nan() {
        let slot = Constant::Number(f64::NAN).to_slot();
        let mut expected = Nbt::compound();
        expected.set_path(&["value"], Nbt::Double(f64::NAN));
        assert!(matches(&slot, &expected));
        assert!(!matches(&Nbt::Int(1), &Nbt::Double(1.0)));
    }

    #[test]
    fn test_decode_slots() {
        assert_eq!(
            RuntimeValue::decode(&Constant::String("a".into()).to_slot()),
            RuntimeValue::Primitive(Constant::String("a".into()))
        );
        let object = Nbt::slot(Kind::Object, Nbt::String("h4".into()), None);
        assert_eq!(
            RuntimeValue::decode(&object),
            RuntimeValue::Reference(Kind::Object, "h4".into())
        );
        assert_eq!(
            RuntimeValue::decode(&Nbt::compound()),
            RuntimeValue::Primitive(Constant::Undefined)
        );
    }
}
