//! Instruction IR for compiled units
//!
//! A [`Program`] is a set of named [`Unit`]s. Each unit is a flat list of
//! [`Instr`]s over three storages: slots (tagged values), heap records and
//! parameter channels. The IR maps one-to-one onto target commands, see
//! `crate::dialect`.

use serde::{Deserialize, Serialize};

use crate::value::{FxIndexMap, Nbt};

/// Return code of a unit that completed normally
pub const NORMAL: i32 = 0;

/// Return code relayed upward by `break` until a loop or switch consumes it
pub const BREAK: i32 = 1_000_001;

/// Return code relayed upward by `return` until the function body unit
pub const RETURN: i32 = 1_000_002;

/// Positional entries a parameter channel carries (`arg0`..`arg7`)
pub const MAX_ARGS: usize = 8;

/// Slot index, rendered as `s<N>` in the slot storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

/// Heap record index, rendered as `h<N>` in the heap storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeapId(pub u32);

/// Channel index, rendered as `c<N>` in the channel storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

impl SlotId {
    pub fn key(self) -> String {
        format!("s{}", self.0)
    }
}

impl HeapId {
    pub fn key(self) -> String {
        format!("h{}", self.0)
    }
}

impl ChannelId {
    pub fn key(self) -> String {
        format!("c{}", self.0)
    }
}

/// The three storages of the target environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    Slots,
    Heap,
    Channels,
}

impl Storage {
    pub fn as_str(self) -> &'static str {
        match self {
            Storage::Slots => "slots",
            Storage::Heap => "heap",
            Storage::Channels => "channels",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Addr {
    Slot(SlotId),
    Heap(HeapId),
    Channel(ChannelId),
}

impl Addr {
    pub fn storage(self) -> Storage {
        match self {
            Addr::Slot(_) => Storage::Slots,
            Addr::Heap(_) => Storage::Heap,
            Addr::Channel(_) => Storage::Channels,
        }
    }

    pub fn key(self) -> String {
        match self {
            Addr::Slot(id) => id.key(),
            Addr::Heap(id) => id.key(),
            Addr::Channel(id) => id.key(),
        }
    }
}

/// A location: an address plus a path below it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub addr: Addr,
    pub path: Vec<String>,
}

impl Place {
    pub fn slot(id: SlotId) -> Self {
        Place {
            addr: Addr::Slot(id),
            path: Vec::new(),
        }
    }

    /// One field of a slot compound (`type`, `value` or `function`)
    pub fn slot_field(id: SlotId, field: &str) -> Self {
        Place {
            addr: Addr::Slot(id),
            path: vec![field.to_string()],
        }
    }

    pub fn heap(id: HeapId, path: &[&str]) -> Self {
        Place {
            addr: Addr::Heap(id),
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn channel(id: ChannelId, entry: Option<&str>) -> Self {
        Place {
            addr: Addr::Channel(id),
            path: entry.map(|e| vec![e.to_string()]).unwrap_or_default(),
        }
    }
}

/// Source of a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(Nbt),
    Copy(Place),
    /// Entry of the channel the unit was invoked with; the write is skipped when absent
    Param(String),
}

impl Operand {
    pub fn string(s: impl Into<String>) -> Self {
        Operand::Literal(Nbt::String(s.into()))
    }

    /// The bare storage key of a slot, as library primitives expect it
    pub fn slot_address(id: SlotId) -> Self {
        Operand::string(id.key())
    }
}

/// A single storage comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    pub place: Place,
    pub value: Nbt,
    pub negate: bool,
}

/// Conjunction of tests; the empty guard always holds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub tests: Vec<Test>,
}

impl Guard {
    pub fn always() -> Self {
        Guard::default()
    }

    pub fn when(place: Place, value: Nbt) -> Self {
        Guard::always().and(place, value)
    }

    pub fn unless(place: Place, value: Nbt) -> Self {
        Guard::always().and_not(place, value)
    }

    pub fn and(mut self, place: Place, value: Nbt) -> Self {
        self.tests.push(Test {
            place,
            value,
            negate: false,
        });
        self
    }

    pub fn and_not(mut self, place: Place, value: Nbt) -> Self {
        self.tests.push(Test {
            place,
            value,
            negate: true,
        });
        self
    }

    pub fn is_always(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Runtime library units the compiled code calls by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Add,
    Subtract,
    MathOperation,
    Equals,
    NumberCompare,
    ToNumber,
    GetMember,
    SetMember,
    ComputedMember,
    PrototypeMember,
    LoopArray,
    SetClassPrototype,
    ResolvePromise,
    AwaitPromise,
    InitPromise,
    SingleQuoteConcat,
    SetVariable,
    CallFunction,
    BindFunction,
    Allocate,
    Run,
    Schedule,
}

impl Primitive {
    pub const ALL: [Primitive; 22] = [
        Primitive::Add,
        Primitive::Subtract,
        Primitive::MathOperation,
        Primitive::Equals,
        Primitive::NumberCompare,
        Primitive::ToNumber,
        Primitive::GetMember,
        Primitive::SetMember,
        Primitive::ComputedMember,
        Primitive::PrototypeMember,
        Primitive::LoopArray,
        Primitive::SetClassPrototype,
        Primitive::ResolvePromise,
        Primitive::AwaitPromise,
        Primitive::InitPromise,
        Primitive::SingleQuoteConcat,
        Primitive::SetVariable,
        Primitive::CallFunction,
        Primitive::BindFunction,
        Primitive::Allocate,
        Primitive::Run,
        Primitive::Schedule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Add => "add",
            Primitive::Subtract => "subtract",
            Primitive::MathOperation => "mathoperation",
            Primitive::Equals => "equals",
            Primitive::NumberCompare => "numbercompare",
            Primitive::ToNumber => "tonumber",
            Primitive::GetMember => "getmember",
            Primitive::SetMember => "setmember",
            Primitive::ComputedMember => "computedmember",
            Primitive::PrototypeMember => "prototypemember",
            Primitive::LoopArray => "looparray",
            Primitive::SetClassPrototype => "setclassprototype",
            Primitive::ResolvePromise => "resolvepromise",
            Primitive::AwaitPromise => "awaitpromise",
            Primitive::InitPromise => "initpromise",
            Primitive::SingleQuoteConcat => "singlequoteconcat",
            Primitive::SetVariable => "setvariable",
            Primitive::CallFunction => "callfunction",
            Primitive::BindFunction => "bindfunction",
            Primitive::Allocate => "allocate",
            Primitive::Run => "run",
            Primitive::Schedule => "schedule",
        }
    }

    pub fn parse(name: &str) -> Option<Primitive> {
        Primitive::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Unit name of the primitive inside the namespace
    pub fn unit_name(self) -> String {
        format!("lib/{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// A compiled unit, by unit name
    Unit(String),
    Library(Primitive),
}

impl Target {
    pub fn unit_name(&self) -> String {
        match self {
            Target::Unit(name) => name.clone(),
            Target::Library(primitive) => primitive.unit_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instr {
    /// Write `src` into `dst` when `guard` holds
    Set {
        guard: Guard,
        dst: Place,
        src: Operand,
    },
    /// Append `src` to the list at `dst`
    Append { dst: Place, src: Operand },
    /// Call a unit, optionally with a channel, storing its return code in `store`
    Invoke {
        guard: Guard,
        target: Target,
        channel: Option<ChannelId>,
        store: Option<Place>,
    },
    /// Terminate the unit with `code` when `guard` holds
    ReturnIf { guard: Guard, code: i32 },
    Return(i32),
    /// A command emitted verbatim
    Raw(String),
}

/// What a unit was compiled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Script,
    Function,
    Arrow,
    Method,
    Constructor,
    Block,
    Loop,
    Case,
    Expression,
    Continuation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMeta {
    pub kind: UnitKind,
    pub is_async: bool,
    /// Slot holding the bound instance
    pub that: Option<String>,
    /// Slot holding the address of the superclass prototype
    pub super_class: Option<String>,
    /// Scope ids visible at definition time, outermost first
    pub scope_chain: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub meta: UnitMeta,
    pub instrs: Vec<Instr>,
}

/// Signature of a top-level function declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub unit: String,
    pub params: Vec<String>,
    pub is_async: bool,
    /// Slot of the global binding the declaration introduced
    pub binding: SlotId,
}

/// Output of a compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub namespace: String,
    /// Unit run once at load time (prelude + top-level statements)
    pub entry: String,
    pub units: FxIndexMap<String, Unit>,
    pub functions: FxIndexMap<String, FunctionSig>,
    pub globals: FxIndexMap<String, SlotId>,
    /// First heap index free for runtime allocation
    pub heap_base: u32,
}

impl Program {
    /// Fully qualified function id of a unit
    pub fn function_id(&self, unit: &str) -> String {
        format!("{}:{}", self.namespace, unit)
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.units.get(name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Program, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names_round_trip() {
        for primitive in Primitive::ALL {
            assert_eq!(Primitive::parse(primitive.as_str()), Some(primitive));
        }
        assert_eq!(Primitive::MathOperation.unit_name(), "lib/mathoperation");
    }

    #[test]
    fn test_addresses() {
        assert_eq!(Addr::Slot(SlotId(3)).key(), "s3");
        assert_eq!(Addr::Heap(HeapId(0)).storage(), Storage::Heap);
        assert_eq!(
            Place::slot_field(SlotId(1), "type").path,
            vec!["type".to_string()]
        );
    }
}
