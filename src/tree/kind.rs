//! The closed set of tree node kinds and their wire codes.
//!
//! Every node carries exactly one [`NodeKind`]. The set is closed on
//! purpose: encode and decode dispatch with exhaustive matches, so adding
//! a kind without teaching both sides about it fails to compile instead of
//! silently corrupting images.
//!
//! Wire codes are explicit and stable. Codes are grouped in blocks per
//! [`Category`] with gaps left for growth; a code is never reused.

/// The broad structural family of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Named entities: variables, functions, types, templates, namespaces.
    Declaration,
    /// Type nodes.
    Type,
    /// Statement nodes.
    Statement,
    /// Expression nodes.
    Expression,
    /// Constant nodes.
    Constant,
    /// Structural helpers that fit no other family: identifiers, lists,
    /// vectors, inheritance info, template bookkeeping.
    Exceptional,
}

macro_rules! node_kinds {
    ($($category:ident { $($kind:ident = $code:literal,)+ })+) => {
        /// Discriminates every node shape the engine can transport.
        ///
        /// The numeric value of each variant is its stable wire code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum NodeKind {
            $($(
                #[allow(missing_docs)]
                $kind = $code,
            )+)+
        }

        impl NodeKind {
            /// The structural family of this kind.
            pub fn category(self) -> Category {
                match self {
                    $($(Self::$kind)|+ => Category::$category,)+
                }
            }

            /// Decodes a wire code. `None` means the image was written by
            /// a build with a kind this build does not know.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($($code => Some(Self::$kind),)+)+
                    _ => None,
                }
            }

            /// The stable wire code of this kind.
            pub fn as_u16(self) -> u16 {
                self as u16
            }

            /// The source-level name of this kind, for trace output.
            pub fn name(self) -> &'static str {
                match self {
                    $($(Self::$kind => stringify!($kind),)+)+
                }
            }
        }
    };
}

node_kinds! {
    Declaration {
        TranslationUnitDecl = 0,
        NamespaceDecl = 1,
        VarDecl = 2,
        FunctionDecl = 3,
        TypeDecl = 4,
        TemplateDecl = 5,
        ParmDecl = 6,
        FieldDecl = 7,
        ConstDecl = 8,
        UsingDecl = 9,
        LabelDecl = 10,
        ResultDecl = 11,
        ImportedDecl = 12,
        DebugExprDecl = 13,
    }
    Type {
        VoidType = 20,
        BooleanType = 21,
        IntegerType = 22,
        RealType = 23,
        ComplexType = 24,
        FixedPointType = 25,
        EnumeralType = 26,
        PointerType = 27,
        ReferenceType = 28,
        NullptrType = 29,
        OffsetType = 30,
        ArrayType = 31,
        VectorType = 32,
        FunctionType = 33,
        MethodType = 34,
        LangType = 35,
        RecordType = 36,
        UnionType = 37,
        QualUnionType = 38,
        TemplateTypeParm = 39,
        TemplateTemplateParm = 40,
        BoundTemplateTemplateParm = 41,
        TypenameType = 42,
        TypeofType = 43,
        DecltypeType = 44,
        TypeArgumentPack = 45,
        TypePackExpansion = 46,
        UnboundClassTemplate = 47,
    }
    Statement {
        StatementList = 60,
        UsingStmt = 61,
        TryBlock = 62,
        EhSpecBlock = 63,
        Handler = 64,
        CleanupStmt = 65,
        IfStmt = 66,
        ForStmt = 67,
        RangeForStmt = 68,
        WhileStmt = 69,
        DoStmt = 70,
        BreakStmt = 71,
        ContinueStmt = 72,
        SwitchStmt = 73,
        ExprStmt = 74,
        TagDefn = 75,
    }
    Expression {
        CallExpr = 90,
        AggrInitExpr = 91,
        NewExpr = 92,
        VecNewExpr = 93,
        DeleteExpr = 94,
        VecDeleteExpr = 95,
        TypeExpr = 96,
        VecInitExpr = 97,
        ThrowExpr = 98,
        EmptyClassExpr = 99,
        TemplateIdExpr = 100,
        PseudoDtorExpr = 101,
        ModopExpr = 102,
        DotstarExpr = 103,
        TypeidExpr = 104,
        NonDependentExpr = 105,
        CtorInitializer = 106,
        MustNotThrowExpr = 107,
        OffsetofExpr = 108,
        SizeofExpr = 109,
        AlignofExpr = 110,
        ArrowExpr = 111,
        StmtExpr = 112,
        NontypeArgumentPack = 113,
        ExprPackExpansion = 114,
        CastExpr = 115,
        ReinterpretCastExpr = 116,
        ConstCastExpr = 117,
        StaticCastExpr = 118,
        DynamicCastExpr = 119,
        NoexceptExpr = 120,
        UnaryPlusExpr = 121,
        MemberRef = 122,
        OffsetRef = 123,
        ScopeRef = 124,
        TraitExpr = 125,
        LambdaExpr = 126,
        ArgumentPackSelect = 127,
    }
    Constant {
        IntegerCst = 140,
        RealCst = 141,
        StringCst = 142,
        PtrmemCst = 143,
    }
    Exceptional {
        IdentifierNode = 150,
        TreeList = 151,
        TreeVec = 152,
        TreeBinfo = 153,
        Overload = 154,
        Baselink = 155,
        TemplateInfo = 156,
        TemplateParmIndex = 157,
        DefaultArg = 158,
        StaticAssert = 159,
    }
}

impl NodeKind {
    /// Fixed operand count of a statement or expression kind.
    ///
    /// Kinds with a dedicated body shape, and kinds outside the statement
    /// and expression families, have no generic operands and report zero.
    /// Call-like kinds report zero too; their arity is per node and
    /// travels on the wire.
    pub fn operand_count(self) -> usize {
        match self {
            Self::UsingStmt
            | Self::ExprStmt
            | Self::TypeExpr
            | Self::ThrowExpr
            | Self::TypeidExpr
            | Self::NonDependentExpr
            | Self::CtorInitializer
            | Self::MustNotThrowExpr
            | Self::OffsetofExpr
            | Self::SizeofExpr
            | Self::AlignofExpr
            | Self::ArrowExpr
            | Self::StmtExpr
            | Self::NontypeArgumentPack
            | Self::ExprPackExpansion
            | Self::CastExpr
            | Self::ReinterpretCastExpr
            | Self::ConstCastExpr
            | Self::StaticCastExpr
            | Self::DynamicCastExpr
            | Self::NoexceptExpr
            | Self::UnaryPlusExpr => 1,
            Self::TryBlock
            | Self::EhSpecBlock
            | Self::Handler
            | Self::WhileStmt
            | Self::DoStmt
            | Self::DeleteExpr
            | Self::VecDeleteExpr
            | Self::VecInitExpr
            | Self::TemplateIdExpr
            | Self::DotstarExpr
            | Self::MemberRef
            | Self::OffsetRef
            | Self::ScopeRef => 2,
            Self::CleanupStmt
            | Self::IfStmt
            | Self::RangeForStmt
            | Self::SwitchStmt
            | Self::NewExpr
            | Self::VecNewExpr
            | Self::PseudoDtorExpr
            | Self::ModopExpr => 3,
            Self::ForStmt => 4,
            _ => 0,
        }
    }
}
