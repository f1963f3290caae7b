//! Rendering of units as datapack function files
//!
//! Every [`Instr`] becomes one command. Storages are `<ns>:slots`,
//! `<ns>:heap` and `<ns>:channels`. A unit called with a channel is called
//! `with` that channel compound; the only macro argument it reads is the
//! channel's `frame` key, and channel entries are copied with `set from`, which
//! leaves the destination untouched when the entry is absent.

use std::path::PathBuf;

use serde_json::json;

use crate::compiler::{Guard, Instr, Operand, Place, Program, Target, Test, Unit};
use crate::value::quote_snbt;

/// `pack_format` written into `pack.mcmeta`
pub const PACK_FORMAT: u32 = 48;

/// A rendered file, relative to the datapack root
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub contents: String,
}

/// Render every unit, plus the pack metadata and the load tag running the entry unit
pub fn render(program: &Program) -> Vec<Artifact> {
    let mut artifacts = Vec::with_capacity(program.units.len() + 2);

    let meta = json!({
        "pack": {
            "pack_format": PACK_FORMAT,
            "description": format!("{} (datajs)", program.namespace),
        }
    });
    artifacts.push(Artifact {
        path: PathBuf::from("pack.mcmeta"),
        contents: pretty(&meta),
    });

    let load = json!({ "values": [program.function_id(&program.entry)] });
    artifacts.push(Artifact {
        path: PathBuf::from("data/minecraft/tags/function/load.json"),
        contents: pretty(&load),
    });

    for unit in program.units.values() {
        artifacts.push(Artifact {
            path: unit_path(&program.namespace, &unit.name),
            contents: render_unit(&program.namespace, unit),
        });
    }
    artifacts
}

fn pretty(value: &serde_json::Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_default();
    text.push('\n');
    text
}

/// Path of a unit's function file
pub fn unit_path(namespace: &str, unit: &str) -> PathBuf {
    PathBuf::from(format!("data/{}/function/{}.mcfunction", namespace, unit))
}

/// Render one unit, one command per line
pub fn render_unit(namespace: &str, unit: &Unit) -> String {
    let renderer = Renderer { namespace };
    let mut out = String::new();
    for instr in &unit.instrs {
        out.push_str(&renderer.instr(instr));
        out.push('\n');
    }
    out
}

struct Renderer<'a> {
    namespace: &'a str,
}

impl Renderer<'_> {
    fn instr(&self, instr: &Instr) -> String {
        match instr {
            Instr::Set { guard, dst, src } => {
                let (macro_line, source) = self.source(src);
                let command = format!("data modify {} set {}", self.place(dst), source);
                self.guarded(macro_line, guard, &command)
            }
            Instr::Append { dst, src } => {
                let (macro_line, source) = self.source(src);
                let command = format!("data modify {} append {}", self.place(dst), source);
                self.guarded(macro_line, &Guard::always(), &command)
            }
            Instr::Invoke {
                guard,
                target,
                channel,
                store,
            } => {
                let mut command = format!("function {}", self.target(target));
                if let Some(channel) = channel {
                    command.push_str(&format!(
                        " with storage {}:channels {}",
                        self.namespace,
                        channel.key()
                    ));
                }
                match store {
                    Some(store) => {
                        let mut prefix = self.conditions(guard);
                        prefix.push(format!("store result {} int 1", self.place(store)));
                        format!("execute {} run {}", prefix.join(" "), command)
                    }
                    None => self.guarded(false, guard, &command),
                }
            }
            Instr::ReturnIf { guard, code } => {
                self.guarded(false, guard, &format!("return {}", code))
            }
            Instr::Return(code) => format!("return {}", code),
            Instr::Raw(command) => command.clone(),
        }
    }

    fn target(&self, target: &Target) -> String {
        format!("{}:{}", self.namespace, target.unit_name())
    }

    /// Source clause of a `data modify`, and whether it needs the macro prefix
    fn source(&self, src: &Operand) -> (bool, String) {
        match src {
            Operand::Literal(value) => (false, format!("value {}", value.to_snbt())),
            Operand::Copy(place) => (false, format!("from {}", self.place(place))),
            Operand::Param(entry) => (
                true,
                format!(
                    "from storage {}:channels $(frame).{}",
                    self.namespace,
                    path_segment(entry)
                ),
            ),
        }
    }

    fn guarded(&self, macro_line: bool, guard: &Guard, command: &str) -> String {
        let prefix = if macro_line { "$" } else { "" };
        if guard.is_always() {
            format!("{}{}", prefix, command)
        } else {
            format!(
                "{}execute {} run {}",
                prefix,
                self.conditions(guard).join(" "),
                command
            )
        }
    }

    fn conditions(&self, guard: &Guard) -> Vec<String> {
        guard.tests.iter().map(|test| self.condition(test)).collect()
    }

    /// `if data storage ns:slots s3{type:"number"}`: the parent path filtered on the last key
    fn condition(&self, test: &Test) -> String {
        let keyword = if test.negate { "unless" } else { "if" };
        let mut segments = vec![test.place.addr.key()];
        segments.extend(test.place.path.iter().cloned());

        let (last, parents) = match segments.split_last() {
            Some((last, parents)) => (last.clone(), parents.to_vec()),
            None => (String::new(), Vec::new()),
        };
        let parent = parents
            .iter()
            .map(|s| path_segment(s))
            .collect::<Vec<_>>()
            .join(".");
        format!(
            "{} data storage {}:{} {}{{{}:{}}}",
            keyword,
            self.namespace,
            test.place.addr.storage().as_str(),
            parent,
            path_segment(&last),
            test.value.to_snbt()
        )
    }

    fn place(&self, place: &Place) -> String {
        format!(
            "storage {}:{} {}",
            self.namespace,
            place.addr.storage().as_str(),
            path(place)
        )
    }
}

/// NBT path of a place inside its storage
pub fn path(place: &Place) -> String {
    let mut out = place.addr.key();
    for segment in &place.path {
        out.push('.');
        out.push_str(&path_segment(segment));
    }
    out
}

/// A path segment, quoted unless it is a plain key
fn path_segment(segment: &str) -> String {
    let plain = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'));
    if plain {
        segment.to_string()
    } else {
        quote_snbt(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ChannelId, HeapId, Primitive, SlotId, UnitKind, UnitMeta};
    use crate::value::{Constant, Kind, Nbt};

    fn unit(instrs: Vec<Instr>) -> Unit {
        Unit {
            name: "main".to_string(),
            meta: UnitMeta {
                kind: UnitKind::Function,
                is_async: false,
                that: None,
                super_class: None,
                scope_chain: vec![0],
            },
            instrs,
        }
    }

    fn render_one(instr: Instr) -> String {
        render_unit("ns", &unit(vec![instr])).trim_end().to_string()
    }

    #[test]
    fn test_render_literal_write() {
        let line = render_one(Instr::Set {
            guard: Guard::always(),
            dst: Place::slot(SlotId(3)),
            src: Operand::Literal(Constant::Number(1.5).to_slot()),
        });
        assert_eq!(
            line,
            "data modify storage ns:slots s3 set value {type:\"number\",value:1.5d}"
        );
    }

    #[test]
    fn test_render_param_uses_frame_macro() {
        let line = render_one(Instr::Set {
            guard: Guard::always(),
            dst: Place::slot(SlotId(1)),
            src: Operand::Param("arg0".to_string()),
        });
        assert_eq!(
            line,
            "$data modify storage ns:slots s1 set from storage ns:channels $(frame).arg0"
        );
    }

    #[test]
    fn test_render_relay_call() {
        let guard = Guard::when(
            Place::slot_field(SlotId(2), "value"),
            Nbt::Bool(true),
        );
        let line = render_one(Instr::Invoke {
            guard,
            target: Target::Unit("__gen/u4".to_string()),
            channel: None,
            store: Some(Place::slot(SlotId(9))),
        });
        assert_eq!(
            line,
            "execute if data storage ns:slots s2{value:1b} store result storage ns:slots s9 int 1 run function ns:__gen/u4"
        );

        let line = render_one(Instr::ReturnIf {
            guard: Guard::when(Place::slot(SlotId(9)), Nbt::Int(1_000_001)),
            code: 1_000_001,
        });
        assert_eq!(
            line,
            "execute if data storage ns:slots {s9:1000001} run return 1000001"
        );
    }

    #[test]
    fn test_render_library_call_with_channel() {
        let line = render_one(Instr::Invoke {
            guard: Guard::always(),
            target: Target::Library(Primitive::GetMember),
            channel: Some(ChannelId(7)),
            store: None,
        });
        assert_eq!(line, "function ns:lib/getmember with storage ns:channels c7");
    }

    #[test]
    fn test_quoted_heap_paths() {
        let place = Place::heap(HeapId(2), &["props", "my key"]);
        assert_eq!(path(&place), "h2.props.\"my key\"");
        let negated = Guard::unless(
            Place::slot_field(SlotId(1), "type"),
            Nbt::String(Kind::Undefined.as_str().to_string()),
        );
        let line = render_one(Instr::ReturnIf {
            guard: negated,
            code: 0,
        });
        assert_eq!(
            line,
            "execute unless data storage ns:slots s1{type:\"undefined\"} run return 0"
        );
    }

    #[test]
    fn test_render_program_files() {
        let compilation = crate::compile(
            "let x = 1;",
            &crate::Options::default().with_namespace("demo").without_prelude(),
        );
        let artifacts = render(&compilation.program);
        let paths: Vec<_> = artifacts.iter().map(|a| a.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("pack.mcmeta")));
        assert!(paths.contains(&PathBuf::from("data/demo/function/__gen/init.mcfunction")));
        let load = artifacts
            .iter()
            .find(|a| a.path.ends_with("load.json"))
            .map(|a| a.contents.clone())
            .unwrap_or_default();
        assert!(load.contains("demo:__gen/init"));
    }
}
