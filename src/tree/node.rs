//! The in-memory shape of tree nodes and their satellite records.
//!
//! A [`Node`] is a small common part (kind, name, type, chain, location,
//! flag bits) plus a [`Body`] payload that varies by kind. Satellite
//! records that are not tree nodes themselves, binding scopes, name
//! bindings and saved function state, have their own structs and live in
//! their own arenas.
//!
//! Union-like extensions ([`LangDecl`], [`LangType`]) are modeled as Rust
//! enums; the wire selector is derived from the active variant when
//! encoding, which makes an out-of-range selector unrepresentable on the
//! write side.

use crate::tokens::TokenCache;
use crate::tree::id::{BindingId, NodeId, ScopeId};
use crate::tree::kind::{Category, NodeKind};

/// A source position attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File name, interned into the image string table on write.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// The per-node generic flag byte.
///
/// Bits 0..=6 are the language-dependent flag bits every node carries;
/// bit 7 marks front-end builtins, which filtered chains skip and the
/// preloaded cache covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeFlags(u8);

impl NodeFlags {
    const BUILTIN_MASK: u8 = 0b1000_0000;

    /// Number of generic language flag bits.
    pub const LANG_FLAGS: u32 = 7;

    /// Reads language flag `index` (0..=6).
    pub fn lang_flag(&self, index: u32) -> bool {
        assert!(index < Self::LANG_FLAGS, "lang flag index out of range");
        self.0 & (1 << index) != 0
    }

    /// Sets language flag `index` (0..=6).
    pub fn set_lang_flag(&mut self, index: u32, value: bool) {
        assert!(index < Self::LANG_FLAGS, "lang flag index out of range");
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// True if the node is a front-end builtin.
    pub fn builtin(&self) -> bool {
        self.0 & Self::BUILTIN_MASK != 0
    }

    /// Marks or unmarks the node as a front-end builtin.
    pub fn set_builtin(&mut self, value: bool) {
        if value {
            self.0 |= Self::BUILTIN_MASK;
        } else {
            self.0 &= !Self::BUILTIN_MASK;
        }
    }
}

/// One tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// What this node is. Fixed at construction.
    pub kind: NodeKind,
    /// The identifier naming this node, when it has one.
    pub name: Option<NodeId>,
    /// The node's type.
    pub ttype: Option<NodeId>,
    /// Next node in a declaration or statement chain.
    ///
    /// Chains are reconstructed from counted list records on decode; the
    /// per-node record does not carry this field except for the few kinds
    /// whose wire shape includes it (tree lists, overload sets).
    pub chain: Option<NodeId>,
    /// Where the node came from, if known.
    pub location: Option<SourceLocation>,
    /// Generic flag bits.
    pub flags: NodeFlags,
    /// Kind-dependent payload.
    pub body: Body,
}

impl Node {
    /// Creates a node of `kind` with the empty body shape that kind
    /// expects and no links.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            ttype: None,
            chain: None,
            location: None,
            flags: NodeFlags::default(),
            body: Body::for_kind(kind),
        }
    }

    /// True if this node is a builtin declaration, the class of nodes
    /// filtered chains drop.
    pub fn is_builtin_decl(&self) -> bool {
        self.kind.category() == Category::Declaration && self.flags.builtin()
    }
}

/// Kind-dependent node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Kinds whose content is fully captured by the common part.
    None,
    /// Declarations.
    Decl(DeclBody),
    /// Types.
    Type(TypeBody),
    /// Statement lists: the contained statements in order.
    Stmts(Vec<NodeId>),
    /// Fixed-arity statements and expressions: one slot per operand, the
    /// count determined by the kind.
    Operands(Vec<Option<NodeId>>),
    /// Call-like expressions with explicit arity.
    Call(CallBody),
    /// Integer constants.
    IntCst {
        /// The constant's value.
        value: i64,
    },
    /// Real constants, transported as raw bits.
    RealCst {
        /// IEEE-754 bit image of the value.
        bits: u64,
    },
    /// String constants.
    StrCst {
        /// The literal's bytes.
        text: String,
    },
    /// Identifier nodes.
    Ident(IdentBody),
    /// Tree lists. The link to the next element is the common `chain`.
    List {
        /// The element's key slot.
        purpose: Option<NodeId>,
        /// The element's value slot.
        value: Option<NodeId>,
    },
    /// Tree vectors.
    TreeVec(Vec<NodeId>),
    /// Inheritance information for a class type.
    Binfo(BinfoBody),
    /// One entry of an overload set; the set is linked via `chain`.
    Overload {
        /// The function this entry contributes.
        function: Option<NodeId>,
    },
    /// A baselink (member function lookup result).
    Baselink {
        /// Binfo the functions were found in.
        binfo: Option<NodeId>,
        /// The candidate functions.
        functions: Option<NodeId>,
        /// Binfo controlling access checks.
        access_binfo: Option<NodeId>,
    },
    /// Template instantiation bookkeeping.
    TemplateInfo(TemplateInfoBody),
    /// A template parameter position.
    TemplateParmIndex(TemplateParmIndexBody),
    /// Pointer-to-member constants.
    PtrmemCst {
        /// The member the constant designates.
        member: Option<NodeId>,
    },
    /// A deferred default argument: raw lexer tokens plus the
    /// instantiations waiting on them.
    DefaultArg(DefaultArgBody),
    /// A static assertion.
    StaticAssert {
        /// The asserted condition.
        condition: Option<NodeId>,
        /// The message string constant.
        message: Option<NodeId>,
    },
    /// Selection of one argument out of an argument pack.
    ArgumentPackSelect {
        /// The pack selected from.
        pack: Option<NodeId>,
        /// Index into the pack.
        index: u32,
    },
    /// A type trait query.
    TraitExpr {
        /// First queried type.
        type1: Option<NodeId>,
        /// Second queried type, when the trait is binary.
        type2: Option<NodeId>,
        /// Which trait is queried.
        trait_kind: u32,
    },
    /// A lambda expression.
    Lambda(LambdaBody),
}

impl Body {
    /// The empty body shape a freshly materialized node of `kind` gets.
    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::StatementList => Body::Stmts(Vec::new()),
            NodeKind::CallExpr | NodeKind::AggrInitExpr => Body::Call(CallBody::default()),
            NodeKind::IntegerCst => Body::IntCst { value: 0 },
            NodeKind::RealCst => Body::RealCst { bits: 0 },
            NodeKind::StringCst => Body::StrCst {
                text: String::new(),
            },
            NodeKind::PtrmemCst => Body::PtrmemCst { member: None },
            NodeKind::IdentifierNode => Body::Ident(IdentBody::default()),
            NodeKind::TreeList => Body::List {
                purpose: None,
                value: None,
            },
            NodeKind::TreeVec => Body::TreeVec(Vec::new()),
            NodeKind::TreeBinfo => Body::Binfo(BinfoBody::default()),
            NodeKind::Overload => Body::Overload { function: None },
            NodeKind::Baselink => Body::Baselink {
                binfo: None,
                functions: None,
                access_binfo: None,
            },
            NodeKind::TemplateInfo => Body::TemplateInfo(TemplateInfoBody::default()),
            NodeKind::TemplateParmIndex => {
                Body::TemplateParmIndex(TemplateParmIndexBody::default())
            }
            NodeKind::DefaultArg => Body::DefaultArg(DefaultArgBody::default()),
            NodeKind::StaticAssert => Body::StaticAssert {
                condition: None,
                message: None,
            },
            NodeKind::ArgumentPackSelect => Body::ArgumentPackSelect {
                pack: None,
                index: 0,
            },
            NodeKind::TraitExpr => Body::TraitExpr {
                type1: None,
                type2: None,
                trait_kind: 0,
            },
            NodeKind::LambdaExpr => Body::Lambda(LambdaBody::default()),
            _ => match kind.category() {
                Category::Declaration => Body::Decl(DeclBody::default()),
                Category::Type => Body::Type(TypeBody::default()),
                Category::Statement | Category::Expression => {
                    Body::Operands(vec![None; kind.operand_count()])
                }
                _ => Body::None,
            },
        }
    }
}

/// Payload shared by all declaration kinds.
///
/// Individual kinds use a subset: only function decls have a saved body,
/// only typedefs an original type, only templates the template triple.
/// The encoder writes exactly the subset its kind owns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeclBody {
    /// Initial value or definition.
    pub initial: Option<NodeId>,
    /// First parameter of a function declaration; parameters chain.
    pub arguments: Option<NodeId>,
    /// The result declaration of a function.
    pub result: Option<NodeId>,
    /// Saved function body (function decls).
    pub saved_tree: Option<NodeId>,
    /// The type a typedef re-declares (type decls).
    pub original_type: Option<NodeId>,
    /// The declaration a template generates (template decls).
    pub template_result: Option<NodeId>,
    /// The template's parameter list (template decls).
    pub template_parms: Option<NodeId>,
    /// The enclosing context: a namespace, class type or function.
    pub context: Option<NodeId>,
    /// The nine declaration-level language flag bits.
    pub lang_flags: u16,
    /// Language-specific declaration extension.
    pub lang: Option<Box<LangDecl>>,
}

/// Payload shared by all type kinds.
///
/// The `values`, `minval` and `maxval` slots are overloaded the way the
/// front end overloads them: enumerators, array domains, argument type
/// lists and cached variants all live in `values`, range bounds and base
/// types in the other two. The engine transports the slots without
/// interpreting them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBody {
    /// The seven type-level language flag bits.
    pub lang_flags: u8,
    /// Language-specific type extension.
    pub lang: Option<Box<LangType>>,
    /// Kind-dependent values slot: enumerators, array domain, argument
    /// types or cached variants.
    pub values: Option<NodeId>,
    /// Kind-dependent minimum slot: range lower bound.
    pub minval: Option<NodeId>,
    /// Kind-dependent maximum slot: range upper bound or base type.
    pub maxval: Option<NodeId>,
    /// Inheritance info (record, union and qualified-union types).
    pub binfo: Option<NodeId>,
}

/// Payload of call-like expressions.
///
/// Arity is explicit on the wire because nothing else announces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallBody {
    /// The called function expression.
    pub function: Option<NodeId>,
    /// The arguments in call order.
    pub args: Vec<NodeId>,
}

/// Payload of identifier nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentBody {
    /// The identifier's spelling.
    pub text: String,
    /// Binding stack for the namespace meaning of the name.
    pub namespace_bindings: Option<BindingId>,
    /// Binding stack for the local meaning of the name.
    pub bindings: Option<BindingId>,
    /// The class template associated with the name.
    pub class_template_info: Option<NodeId>,
    /// The label this name designates, when used as a label.
    pub label_value: Option<NodeId>,
}

/// Payload of binfo (inheritance) nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BinfoBody {
    /// The type this binfo describes.
    pub btype: Option<NodeId>,
    /// Direct bases, in declaration order.
    pub bases: Vec<NodeId>,
    /// The vtable decl.
    pub vtable: Option<NodeId>,
    /// The virtual functions list.
    pub virtuals: Option<NodeId>,
}

/// A `(purpose, value)` pair used by vcall indices and nested types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreePair {
    /// The pair's key.
    pub purpose: Option<NodeId>,
    /// The pair's value.
    pub value: Option<NodeId>,
}

/// One qualified typedef usage awaiting an access check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualifiedTypedefUse {
    /// The typedef that was named.
    pub typedef_decl: Option<NodeId>,
    /// The qualifying context it was named through.
    pub context: Option<NodeId>,
    /// Where it was named.
    pub location: Option<SourceLocation>,
}

/// Payload of template-info nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateInfoBody {
    /// The template being instantiated.
    pub template: Option<NodeId>,
    /// The instantiation arguments.
    pub args: Option<NodeId>,
    /// Typedefs used in the instantiation whose access must be rechecked.
    pub typedefs: Vec<QualifiedTypedefUse>,
}

/// Payload of template parameter index nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParmIndexBody {
    /// Parameter position within its level.
    pub index: u32,
    /// Binding level of the parameter.
    pub level: u32,
    /// Level before any reduction.
    pub orig_level: u32,
    /// Number of sibling parameters.
    pub num_siblings: u32,
    /// The parameter declaration.
    pub decl: Option<NodeId>,
}

/// Payload of deferred default arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultArgBody {
    /// The unlexed argument tokens.
    pub tokens: TokenCache,
    /// Instantiations waiting for the argument to be parsed.
    pub instantiations: Vec<NodeId>,
}

/// Payload of lambda expression nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LambdaBody {
    /// The captures, as a tree list.
    pub capture_list: Option<NodeId>,
    /// The captured `this`, if any.
    pub this_capture: Option<NodeId>,
    /// Deduced or declared return type.
    pub return_type: Option<NodeId>,
    /// The enclosing scope the lambda appears in.
    pub extra_scope: Option<NodeId>,
    /// Discriminator among lambdas in the same scope.
    pub discriminator: u32,
}

// --- LANGUAGE-SPECIFIC DECLARATION EXTENSION ---

/// Source language of a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Language {
    /// Plain C.
    C = 0,
    /// C++.
    #[default]
    Cxx = 1,
}

impl Language {
    /// Decodes the 4-bit wire field.
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::C),
            1 => Some(Self::Cxx),
            _ => None,
        }
    }
}

/// The language-specific declaration extension.
///
/// The wire form packs a selector naming the payload variant first; the
/// selector is derived from [`LangDeclPayload`], never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LangDecl {
    /// Source language of the declaration.
    pub language: Language,
    /// Template usage class (2-bit field: none, explicit, implicit).
    pub use_template: u8,
    /// Declared extern but satisfied in this unit.
    pub not_really_extern: bool,
    /// Member initialized inside the class body.
    pub initialized_in_class: bool,
    /// Instantiation available in the template repository.
    pub repo_available: bool,
    /// Thread-private variable, or deleted function.
    pub threadprivate_or_deleted: bool,
    /// Declared before its first real declaration (builtins, friends).
    pub anticipated: bool,
    /// Friend declaration (or thread-local storage for variables).
    pub friend_or_tls: bool,
    /// Template conversion operator.
    pub template_conv: bool,
    /// Used in a way that requires a definition.
    pub odr_used: bool,
    /// The variant payload.
    pub payload: LangDeclPayload,
}

impl LangDecl {
    /// A minimal C++ extension with no template info.
    pub fn minimal() -> Self {
        Self {
            language: Language::Cxx,
            use_template: 0,
            not_really_extern: false,
            initialized_in_class: false,
            repo_available: false,
            threadprivate_or_deleted: false,
            anticipated: false,
            friend_or_tls: false,
            template_conv: false,
            odr_used: false,
            payload: LangDeclPayload::Min(LangDeclMin::default()),
        }
    }
}

/// The selector-discriminated payload of [`LangDecl`].
#[derive(Debug, Clone, PartialEq)]
pub enum LangDeclPayload {
    /// Ordinary declarations.
    Min(LangDeclMin),
    /// Function declarations.
    Fn(Box<LangDeclFn>),
    /// Namespace declarations.
    Ns(LangDeclNs),
    /// Parameter declarations.
    Parm(LangDeclParm),
}

impl LangDeclPayload {
    /// The wire selector for this payload.
    pub fn selector(&self) -> u32 {
        match self {
            Self::Min(_) => 0,
            Self::Fn(_) => 1,
            Self::Ns(_) => 2,
            Self::Parm(_) => 3,
        }
    }
}

/// Secondary payload of [`LangDeclMin`]: an access path or a
/// discriminator, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum MinSecondary {
    /// Access the declaration was granted in its class.
    Access(Option<NodeId>),
    /// Discriminator among same-named locals.
    Discriminator(u32),
}

impl Default for MinSecondary {
    fn default() -> Self {
        Self::Access(None)
    }
}

/// Extension payload for ordinary declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangDeclMin {
    /// Template bookkeeping for the declaration.
    pub template_info: Option<NodeId>,
    /// Access or discriminator, selected by a one-bit field on the wire.
    pub secondary: MinSecondary,
}

/// Thunk detail of a function extension: either the function this one
/// was cloned from, or a fixed `this` adjustment when the function is a
/// thunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ThunkDetail {
    /// Not a thunk; the cloned-from function, if any.
    Cloned(Option<NodeId>),
    /// A thunk with this fixed offset.
    FixedOffset(i64),
}

impl Default for ThunkDetail {
    fn default() -> Self {
        Self::Cloned(None)
    }
}

/// Deferred-body detail of a function extension: raw tokens still to be
/// lexed, or already-saved parsing state.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingBody {
    /// The body is an unlexed token run (deferred inline function).
    Tokens(TokenCache),
    /// The body was parsed; its saved state, if the function has one.
    Saved(Option<Box<Function>>),
}

impl Default for PendingBody {
    fn default() -> Self {
        Self::Saved(None)
    }
}

/// Extension payload for function declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangDeclFn {
    /// The ordinary-declaration part.
    pub min: LangDeclMin,
    /// Which operator this function overloads, if any.
    pub operator_code: u16,
    /// Global constructor function.
    pub global_ctor: bool,
    /// Global destructor function.
    pub global_dtor: bool,
    /// Carries the constructor attribute.
    pub constructor_attr: bool,
    /// Carries the destructor attribute.
    pub destructor_attr: bool,
    /// Assignment operator.
    pub assignment_operator: bool,
    /// Static member function.
    pub static_function: bool,
    /// Pure virtual.
    pub pure_virtual: bool,
    /// Explicitly defaulted.
    pub defaulted: bool,
    /// Takes an in-charge parameter.
    pub has_in_charge_parm: bool,
    /// Takes a VTT parameter.
    pub has_vtt_parm: bool,
    /// Non-converting constructor.
    pub nonconverting: bool,
    /// Thunk calling `this` through a second adjustment.
    pub this_thunk: bool,
    /// Friend defined in a class body, invisible to normal lookup.
    pub hidden_friend: bool,
    /// Classes befriending this function.
    pub befriending_classes: Option<NodeId>,
    /// The class context of a clone.
    pub context: Option<NodeId>,
    /// Thunk union, discriminated by its variant on the wire.
    pub thunk: ThunkDetail,
    /// Deferred-body union, discriminated by its variant on the wire.
    pub pending: PendingBody,
}

/// Extension payload for namespace declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangDeclNs {
    /// The namespace's binding level.
    pub level: Option<ScopeId>,
}

/// Extension payload for parameter declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangDeclParm {
    /// Binding level the parameter belongs to.
    pub level: u32,
    /// Position within that level.
    pub index: u32,
}

// --- LANGUAGE-SPECIFIC TYPE EXTENSION ---

/// The language-specific type extension.
///
/// The header flags come first on the wire; the class-vs-ptrmem bit is
/// derived from [`LangTypePayload`].
#[derive(Debug, Clone, PartialEq)]
pub struct LangType {
    /// The type declares a conversion operator.
    pub has_type_conversion: bool,
    /// The type has a copy constructor taking a reference.
    pub has_init_ref: bool,
    /// The type has a default constructor.
    pub has_default_ctor: bool,
    /// The copy constructor takes a const reference.
    pub const_init_ref: bool,
    /// The type declares `operator new`.
    pub has_new: bool,
    /// The type declares `operator new[]`.
    pub has_array_new: bool,
    /// The variant payload.
    pub payload: LangTypePayload,
}

/// The discriminated payload of [`LangType`].
#[derive(Debug, Clone, PartialEq)]
pub enum LangTypePayload {
    /// Class types.
    Class(Box<LangTypeClass>),
    /// Pointer-to-member-function records.
    Ptrmem(LangTypePtrmem),
}

/// Class-type extension payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangTypeClass {
    /// Preferred alignment, in bytes.
    pub align: u8,
    /// Has a mutable member.
    pub has_mutable: bool,
    /// Declared as a COM interface.
    pub com_interface: bool,
    /// Not a POD class.
    pub non_pod_class: bool,
    /// Nearly empty (vptr only).
    pub nearly_empty: bool,
    /// Alignment was user-specified.
    pub user_align: bool,
    /// Declared with `class` rather than `struct`.
    pub declared_class: bool,
    /// Has a repeated base class.
    pub repeated_base: bool,
    /// Diamond-shaped inheritance.
    pub diamond_shaped: bool,
    /// Currently being defined.
    pub being_defined: bool,
    /// Debug info was requested for the type.
    pub debug_requested: bool,
    /// Fields are read-only.
    pub fields_readonly: bool,
    /// Template usage class of the type (2-bit field).
    pub use_template: u8,
    /// The type is really a pointer-to-member-function wrapper.
    pub ptrmemfunc_flag: bool,
    /// Was declared anonymous.
    pub was_anonymous: bool,
    /// Default constructor not yet declared.
    pub lazy_default_ctor: bool,
    /// Copy constructor not yet declared.
    pub lazy_copy_ctor: bool,
    /// Copy assignment not yet declared.
    pub lazy_copy_assign: bool,
    /// Destructor not yet declared.
    pub lazy_destructor: bool,
    /// Move constructor not yet declared.
    pub lazy_move_ctor: bool,
    /// Move assignment not yet declared.
    pub lazy_move_assign: bool,
    /// Copy constructor is nontrivial.
    pub has_complex_copy_ctor: bool,
    /// Copy assignment is nontrivial.
    pub has_complex_copy_assign: bool,
    /// Move constructor is nontrivial.
    pub has_complex_move_ctor: bool,
    /// Move assignment is nontrivial.
    pub has_complex_move_assign: bool,
    /// Default constructor is nontrivial.
    pub has_complex_dflt: bool,
    /// Has an initializer-list constructor.
    pub has_list_ctor: bool,
    /// Has a constexpr constructor.
    pub has_constexpr_ctor: bool,
    /// Not an aggregate.
    pub non_aggregate: bool,
    /// Not standard-layout.
    pub non_std_layout: bool,
    /// A literal type.
    pub is_literal: bool,
    /// The primary base class binfo.
    pub primary_base: Option<NodeId>,
    /// Virtual call indices, per virtual function.
    pub vcall_indices: Vec<TreePair>,
    /// The type's vtables.
    pub vtables: Option<NodeId>,
    /// The typeinfo variable.
    pub typeinfo_var: Option<NodeId>,
    /// Virtual base binfos, in inheritance graph order.
    pub vbases: Vec<NodeId>,
    /// Nested user-defined types, as (name, type) pairs.
    pub nested_udts: Vec<TreePair>,
    /// The as-base variant of the type.
    pub as_base: Option<NodeId>,
    /// Pure virtual functions still unoverridden.
    pub pure_virtuals: Vec<NodeId>,
    /// Friend classes.
    pub friend_classes: Option<NodeId>,
    /// Member functions, constructors first.
    pub methods: Vec<NodeId>,
    /// The key method that anchors the vtable.
    pub key_method: Option<NodeId>,
    /// Declarations in declared order.
    pub decl_list: Option<NodeId>,
    /// Template bookkeeping for the type.
    pub template_info: Option<NodeId>,
    /// Classes and functions this type befriends.
    pub befriending_classes: Option<NodeId>,
    /// Fields sorted for lookup, populated lazily.
    pub sorted_fields: Option<Vec<NodeId>>,
    /// The lambda this closure type implements.
    pub lambda_expr: Option<NodeId>,
}

/// Pointer-to-member extension payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LangTypePtrmem {
    /// The wrapper record type.
    pub record: Option<NodeId>,
}

// --- SCOPES AND BINDINGS ---

/// What kind of scope a binding level represents (4-bit wire field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ScopeKind {
    /// An ordinary block scope.
    #[default]
    Block = 0,
    /// A cleanup scope.
    Cleanup = 1,
    /// A try block.
    Try = 2,
    /// A catch handler.
    Catch = 3,
    /// The scope of a `for` init-statement.
    For = 4,
    /// Function parameter scope.
    FunctionParms = 5,
    /// A class scope.
    Class = 6,
    /// A scoped enumeration.
    ScopedEnum = 7,
    /// A namespace scope.
    Namespace = 8,
    /// Template parameter scope.
    TemplateParms = 9,
    /// Template specialization scope.
    TemplateSpec = 10,
}

impl ScopeKind {
    /// Decodes the 4-bit wire field.
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Block),
            1 => Some(Self::Cleanup),
            2 => Some(Self::Try),
            3 => Some(Self::Catch),
            4 => Some(Self::For),
            5 => Some(Self::FunctionParms),
            6 => Some(Self::Class),
            7 => Some(Self::ScopedEnum),
            8 => Some(Self::Namespace),
            9 => Some(Self::TemplateParms),
            10 => Some(Self::TemplateSpec),
            _ => None,
        }
    }
}

/// A class-scope shadowed binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassBinding {
    /// The shadowed binding record.
    pub base: Option<BindingId>,
    /// The identifier the binding is for.
    pub identifier: Option<NodeId>,
}

/// A label-scope shadowed binding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelBinding {
    /// The shadowing label.
    pub label: Option<NodeId>,
    /// The previous meaning of the label's name.
    pub prev_value: Option<NodeId>,
}

/// One binding scope (a "binding level").
///
/// Scopes chain to their parent via `level_chain`; the chain may reach
/// back to a scope currently being decoded, so scope records are cached
/// and materialized before their fields are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    /// Declared names, a chain of declarations.
    pub names: Option<NodeId>,
    /// Number of entries written for `names` after filtering.
    pub names_size: u32,
    /// Nested namespaces, a chain.
    pub namespaces: Option<NodeId>,
    /// Static and inline declarations needing end-of-unit processing.
    pub static_decls: Vec<NodeId>,
    /// `using` declarations, a chain.
    pub usings: Option<NodeId>,
    /// `using` directives, a chain.
    pub using_directives: Option<NodeId>,
    /// Class-scope shadowed bindings.
    pub class_shadowed: Vec<ClassBinding>,
    /// Shadowed type bindings, a tree list.
    pub type_shadowed: Option<NodeId>,
    /// Shadowed label bindings.
    pub shadowed_labels: Vec<LabelBinding>,
    /// Blocks completed within this scope, a chain.
    pub blocks: Option<NodeId>,
    /// The entity this scope belongs to (function, class, namespace).
    pub this_entity: Option<NodeId>,
    /// The enclosing scope.
    pub level_chain: Option<ScopeId>,
    /// Variables declared dead by `for` scoping rules.
    pub dead_vars_from_for: Vec<NodeId>,
    /// The statement list being built in this scope.
    pub statement_list: Option<NodeId>,
    /// Nesting depth, for diagnostics.
    pub binding_depth: u32,
    /// What kind of scope this is.
    pub kind: ScopeKind,
    /// Keep this scope's block even if empty.
    pub keep: bool,
    /// More cleanups may still be added.
    pub more_cleanups_ok: bool,
    /// The scope has cleanups to run.
    pub have_cleanups: bool,
}

/// One name binding.
///
/// Bindings stack: an identifier's current binding links to the bindings
/// it shadows via `previous`, and records recurse through that link the
/// same way scopes recurse through their parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    /// The bound value (a declaration).
    pub value: Option<NodeId>,
    /// The bound type, when the name also names a type.
    pub ttype: Option<NodeId>,
    /// The scope the binding appears in.
    pub scope: Option<ScopeId>,
    /// The binding this one shadows.
    pub previous: Option<BindingId>,
    /// The value was inherited rather than declared here.
    pub value_is_inherited: bool,
    /// The binding is local to a function.
    pub is_local: bool,
}

/// Saved function-parsing state for a function declaration.
///
/// Captures what the front end needs to resume the function later:
/// the statement tree under construction, special water-mark trees, and
/// the scope stack. Named-label and extern-declaration maps are rebuilt
/// by the front end and not transported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Function {
    /// The statement lists under construction, innermost last.
    pub statements: Vec<NodeId>,
    /// Statements are treated as full expressions.
    pub stmts_are_full_exprs: bool,
    /// Label for constructor/destructor returns.
    pub cdtor_label: Option<NodeId>,
    /// The `this` pointer expression.
    pub current_class_ptr: Option<NodeId>,
    /// The dereferenced `this` expression.
    pub current_class_ref: Option<NodeId>,
    /// The exception-specification block.
    pub eh_spec_block: Option<NodeId>,
    /// The in-charge parameter.
    pub in_charge_parm: Option<NodeId>,
    /// The VTT parameter.
    pub vtt_parm: Option<NodeId>,
    /// The named return value.
    pub return_value: Option<NodeId>,
    /// The function returns a value.
    pub returns_value: bool,
    /// The function returns null.
    pub returns_null: bool,
    /// The function returns abnormally.
    pub returns_abnormally: bool,
    /// Currently in a function-try-block handler.
    pub in_function_try_handler: bool,
    /// Currently in a base initializer.
    pub in_base_initializer: bool,
    /// The function can throw.
    pub can_throw: bool,
    /// The scope stack of the suspended function.
    pub bindings: Option<ScopeId>,
    /// Local declarations in declaration order.
    pub local_names: Vec<NodeId>,
}
