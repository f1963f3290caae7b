//! Objects, arrays, member access and classes
//!
//! Object and array literals allocate their heap record at run time; member reads
//! and writes go through the `getmember`/`computedmember`/`setmember` primitives,
//! which walk the prototype chain. Class constructors and prototypes are static
//! heap records written where the class is defined.

use super::compile_function::{ClassScope, FunctionBody, FunctionSpec};
use super::{BindingKind, Compiler, HeapId, Operand, Place, Primitive, SlotId, UnitKind, Value};
use crate::ast::{
    ArrayExpression, ClassBody, ClassMember, Expression, Identifier, MemberExpression,
    MemberProperty, MethodKind, ObjectExpression, ObjectProperty, ObjectPropertyKey,
};
use crate::error::CompileError;
use crate::lexer::Span;
use crate::value::{Constant, FxIndexMap, Kind, Nbt, number_to_string};

/// A property key, known at compile time or computed
#[derive(Debug, Clone)]
pub(super) enum MemberKey {
    Static(String),
    Dynamic(SlotId),
}

impl Compiler {
    // ============ MEMBER ACCESS ============

    pub(super) fn compile_member(&mut self, member: &MemberExpression) -> Result<Value, CompileError> {
        if member.optional {
            return Err(CompileError::unsupported("optional chaining", member.span));
        }

        if let Expression::Super(span) = &*member.object {
            let name = static_member_name(&member.property, *span)?;
            return Ok(Value::Slot(self.super_member(&name, *span)?));
        }

        if self.is_global_this(&member.object) {
            if let MemberProperty::Identifier(id) = &member.property {
                return Ok(self
                    .scopes
                    .resolve(&[self.global], &id.name)
                    .map(|binding| Value::Slot(binding.slot))
                    .unwrap_or(Value::Constant(Constant::Undefined)));
            }
        }

        let object = self.compile_expression(&member.object)?;
        let object = self.materialize(object);
        let key = self.member_key(&member.property)?;
        Ok(Value::Slot(self.get_member(object, key)))
    }

    pub(super) fn member_key(&mut self, property: &MemberProperty) -> Result<MemberKey, CompileError> {
        match property {
            MemberProperty::Identifier(id) => Ok(MemberKey::Static(id.name.clone())),
            MemberProperty::Expression(expr) => match self.compile_expression(expr)? {
                Value::Constant(constant) => Ok(MemberKey::Static(constant.to_js_string())),
                Value::Slot(slot) => Ok(MemberKey::Dynamic(slot)),
            },
        }
    }

    /// Read a property through the prototype chain into a fresh slot
    pub(super) fn get_member(&mut self, object: SlotId, key: MemberKey) -> SlotId {
        let result = self.names.slot();
        let (primitive, property) = match key {
            MemberKey::Static(name) => (Primitive::GetMember, Operand::string(name)),
            MemberKey::Dynamic(slot) => (Primitive::ComputedMember, Operand::slot_address(slot)),
        };
        self.call_library(
            primitive,
            vec![
                ("object", Operand::slot_address(object)),
                ("property", property),
                ("result", Operand::slot_address(result)),
            ],
        );
        result
    }

    /// Write an own property of an object or an array element
    pub(super) fn set_member(&mut self, object: SlotId, key: MemberKey, value: SlotId) {
        let key_entry = match key {
            MemberKey::Static(name) => ("property", Operand::string(name)),
            MemberKey::Dynamic(slot) => ("key", Operand::slot_address(slot)),
        };
        self.call_library(
            Primitive::SetMember,
            vec![
                ("object", Operand::slot_address(object)),
                key_entry,
                ("value", Operand::slot_address(value)),
            ],
        );
    }

    /// `super.name`: look the property up from the superclass prototype
    pub(super) fn super_member(&mut self, name: &str, span: Span) -> Result<SlotId, CompileError> {
        let super_proto = self
            .ctx
            .super_proto
            .ok_or_else(|| CompileError::syntax("'super' keyword unexpected here", span))?;
        let result = self.names.slot();
        self.call_library(
            Primitive::PrototypeMember,
            vec![
                (
                    "prototype",
                    Operand::Copy(Place::slot_field(super_proto, "value")),
                ),
                ("property", Operand::string(name)),
                ("result", Operand::slot_address(result)),
            ],
        );
        Ok(result)
    }

    /// Allocate a heap record at run time into a fresh slot
    fn allocate(&mut self, kind: Kind, prototype: Option<Operand>) -> SlotId {
        let result = self.names.slot();
        let mut entries = vec![
            ("result", Operand::slot_address(result)),
            ("kind", Operand::string(kind.as_str())),
        ];
        if let Some(prototype) = prototype {
            entries.push(("prototype", prototype));
        }
        self.call_library(Primitive::Allocate, entries);
        result
    }

    /// Static prototype record of a global class, when one is in scope
    pub(super) fn known_prototype(&self, class: &str) -> Option<HeapId> {
        let binding = self.resolve(class)?;
        self.class_protos.get(&binding.slot).copied()
    }

    /// Allocate an object whose prototype is the global `name` class's, if any
    pub(super) fn allocate_instance_of(&mut self, class: &str) -> SlotId {
        let prototype = self
            .known_prototype(class)
            .map(|proto| Operand::string(proto.key()));
        self.allocate(Kind::Object, prototype)
    }

    // ============ LITERALS ============

    pub(super) fn compile_object(&mut self, obj: &ObjectExpression) -> Result<Value, CompileError> {
        let object = self.allocate_instance_of("Object");

        for property in &obj.properties {
            let property = match property {
                ObjectProperty::Property(property) => property,
                ObjectProperty::Spread(spread) => {
                    return Err(CompileError::unsupported(
                        "spread in object literal",
                        spread.span,
                    ));
                }
            };
            if property.kind != MethodKind::Method {
                return Err(CompileError::unsupported(
                    "getter or setter in object literal",
                    property.span,
                ));
            }

            let name = property_name(&property.key)?;
            let value = match (&property.value, property.method) {
                (Expression::Function(func), true) => {
                    let function = self.create_function(FunctionSpec {
                        kind: UnitKind::Method,
                        unit: None,
                        record: None,
                        params: &func.params,
                        body: FunctionBody::Block(&func.body.body),
                        is_async: func.async_,
                        generator: func.generator,
                        class: None,
                        span: func.span,
                    })?;
                    self.function_value(function.literal)
                }
                (value, _) => self.compile_expression(value)?,
            };
            let value = self.materialize(value);
            self.set_member(object, MemberKey::Static(name), value);
        }

        Ok(Value::Slot(object))
    }

    pub(super) fn compile_array(&mut self, arr: &ArrayExpression) -> Result<Value, CompileError> {
        let array = self.allocate(Kind::Array, None);

        for (index, element) in arr.elements.iter().enumerate() {
            let value = match element {
                Some(Expression::Spread(spread)) => {
                    return Err(CompileError::unsupported(
                        "spread in array literal",
                        spread.span,
                    ));
                }
                Some(expr) => self.compile_expression(expr)?,
                None => Value::Constant(Constant::Undefined),
            };
            let value = self.materialize(value);
            self.set_member(array, MemberKey::Static(index.to_string()), value);
        }

        Ok(Value::Slot(array))
    }

    // ============ CLASSES ============

    /// Compile a class declaration or expression into its constructor value
    pub(super) fn compile_class(
        &mut self,
        id: Option<&Identifier>,
        super_class: Option<&Expression>,
        body: &ClassBody,
        declare: bool,
        span: Span,
    ) -> Result<Value, CompileError> {
        // A named class expression sees its own name
        let inner_scope = !declare && id.is_some();
        if inner_scope {
            let scope = self.scopes.create();
            self.current.push_scope(scope);
        }
        let result = self.compile_class_inner(id, super_class, body, span);
        if inner_scope {
            self.current.pop_scope();
        }
        result
    }

    fn compile_class_inner(
        &mut self,
        id: Option<&Identifier>,
        super_class: Option<&Expression>,
        body: &ClassBody,
        span: Span,
    ) -> Result<Value, CompileError> {
        let record = self.names.heap();
        let proto = self.names.heap();
        let constructor_unit = self.names.unit();

        self.current
            .set(Place::heap(proto, &[]), Operand::Literal(empty_record(None)));
        let prototype_slot = Nbt::slot(Kind::Object, Nbt::String(proto.key()), None);
        self.current.set(
            Place::heap(record, &[]),
            Operand::Literal(empty_record(Some(prototype_slot))),
        );

        let class_value = self.function_literal(record, &constructor_unit);
        let class_slot = self.names.slot();
        self.current
            .set(Place::slot(class_slot), Operand::Literal(class_value));

        if let Some(id) = id {
            let binding = self.declare(&id.name, BindingKind::Class, id.span)?;
            self.current
                .set(Place::slot(binding), Operand::Copy(Place::slot(class_slot)));
            self.class_protos.insert(binding, proto);
        }

        let (super_slot, super_proto) = match super_class {
            Some(expr) => {
                let parent = self.compile_expression(expr)?;
                let parent_slot = self.names.slot();
                self.assign(parent_slot, &parent);
                let parent_proto = self.get_member(parent_slot, MemberKey::Static("prototype".into()));
                self.call_library(
                    Primitive::SetClassPrototype,
                    vec![
                        ("prototype", Operand::string(proto.key())),
                        ("parent", Operand::slot_address(parent_slot)),
                    ],
                );
                (Some(parent_slot), Some(parent_proto))
            }
            None => (None, None),
        };

        let mut constructor = None;
        let mut fields = Vec::new();
        for member in &body.members {
            match member {
                ClassMember::Constructor(ctor) => {
                    if constructor.is_some() {
                        return Err(CompileError::syntax(
                            "A class may only have one constructor",
                            ctor.span,
                        ));
                    }
                    constructor = Some(ctor);
                }
                ClassMember::Property(property) if !property.static_ => {
                    fields.push(property.clone());
                }
                _ => {}
            }
        }

        let scope = ClassScope {
            super_class: super_slot,
            super_proto,
            fields,
        };
        let (params, ctor_body) = match constructor {
            Some(ctor) => (ctor.params.as_slice(), FunctionBody::Block(&ctor.body.body)),
            None => (&[][..], FunctionBody::DefaultConstructor),
        };
        self.create_function(FunctionSpec {
            kind: UnitKind::Constructor,
            unit: Some(constructor_unit),
            record: Some(record),
            params,
            body: ctor_body,
            is_async: false,
            generator: false,
            class: Some(scope.clone()),
            span,
        })?;

        for member in &body.members {
            match member {
                ClassMember::Method(method) => {
                    if method.kind != MethodKind::Method {
                        return Err(CompileError::unsupported(
                            "class getter or setter",
                            method.span,
                        ));
                    }
                    let name = property_name(&method.key)?;
                    let function = self.create_function(FunctionSpec {
                        kind: UnitKind::Method,
                        unit: None,
                        record: None,
                        params: &method.value.params,
                        body: FunctionBody::Block(&method.value.body.body),
                        is_async: method.value.async_,
                        generator: method.value.generator,
                        class: Some(ClassScope {
                            fields: Vec::new(),
                            ..scope.clone()
                        }),
                        span: method.span,
                    })?;
                    let owner = if method.static_ { record } else { proto };
                    self.current.set(
                        Place::heap(owner, &["props", &name]),
                        Operand::Literal(function.literal),
                    );
                }
                ClassMember::Property(property) if property.static_ => {
                    let name = property_name(&property.key)?;
                    let value = match &property.value {
                        Some(value) => self.compile_expression(value)?,
                        None => Value::Constant(Constant::Undefined),
                    };
                    self.current.set(
                        Place::heap(record, &["props", &name]),
                        Self::operand(&value),
                    );
                }
                _ => {}
            }
        }

        Ok(Value::Slot(class_slot))
    }

    /// Initialize instance fields on `this`
    pub(super) fn initialize_fields(
        &mut self,
        fields: &[crate::ast::ClassProperty],
    ) -> Result<(), CompileError> {
        let Some(that) = self.ctx.that else {
            return Ok(());
        };
        for field in fields {
            let name = property_name(&field.key)?;
            let value = match &field.value {
                Some(value) => self.compile_expression(value)?,
                None => Value::Constant(Constant::Undefined),
            };
            let value = self.materialize(value);
            self.set_member(that, MemberKey::Static(name), value);
        }
        Ok(())
    }
}

/// Heap record of a plain object or function
pub(super) fn empty_record(prototype: Option<Nbt>) -> Nbt {
    let mut props = FxIndexMap::default();
    if let Some(prototype) = prototype {
        props.insert("prototype".to_string(), prototype);
    }
    let mut record = FxIndexMap::default();
    record.insert("props".to_string(), Nbt::Compound(props));
    Nbt::Compound(record)
}

fn property_name(key: &ObjectPropertyKey) -> Result<String, CompileError> {
    match key {
        ObjectPropertyKey::Identifier(id) => Ok(id.name.clone()),
        ObjectPropertyKey::String(s, _) => Ok(s.clone()),
        ObjectPropertyKey::Number(n, _) => Ok(number_to_string(*n)),
        ObjectPropertyKey::Computed(expr) => Err(CompileError::unsupported(
            "computed property key",
            expr.span(),
        )),
    }
}

fn static_member_name(property: &MemberProperty, span: Span) -> Result<String, CompileError> {
    match property {
        MemberProperty::Identifier(id) => Ok(id.name.clone()),
        MemberProperty::Expression(expr) => match &**expr {
            Expression::Literal(lit) => match &lit.value {
                crate::ast::LiteralValue::String(s) => Ok(s.clone()),
                _ => Err(CompileError::unsupported("computed super property", span)),
            },
            _ => Err(CompileError::unsupported("computed super property", span)),
        },
    }
}
