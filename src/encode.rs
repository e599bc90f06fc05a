//! Record encoding.
//!
//! Everything here appends to the main section of an open [`ImageWriter`].
//! Each record family has a fixed field order; the decoder consumes the
//! same order, so the two sides form a contract that must change together.
//!
//! A tree record is laid out as:
//!
//! ```text
//! [marker] [slot] [kind] [arity?] [common] [kind-specific fields]
//! ```
//!
//! where `arity` appears only for call-like kinds, and `common` is the
//! flag bit pack, the name, the type and the source location. Records
//! reached through a field (scopes, bindings, language extensions, saved
//! function state) use the same marker framing and nest recursively; the
//! pickle cache terminates the recursion on shared and cyclic paths.
//!
//! Chains are not part of any per-node record. A field that holds the
//! head of a chain is written as a counted list of the surviving
//! elements, and the decoder relinks them; the two list-shaped kinds that
//! do carry their link (tree lists, overload sets) write it as part of
//! their own body.

use crate::bitpack::BitPacker;
use crate::cache::{Handle, SymbolAction};
use crate::error::Result;
use crate::format::RecordMarker;
use crate::tokens::TokenCache;
use crate::tree::node::{
    ClassBinding, Function, LabelBinding, LangDecl, LangDeclFn, LangDeclMin, LangDeclPayload,
    LangType, LangTypeClass, LangTypePayload, MinSecondary, PendingBody, ThunkDetail, TreePair,
};
use crate::tree::{BindingId, Body, Node, NodeFlags, NodeId, NodeKind, ScopeId};
use crate::writer::ImageWriter;

impl ImageWriter<'_> {
    /// Pickles `root` and records it as a top-level symbol with `action`.
    ///
    /// Roots already covered by an earlier `write_tree` call on the same
    /// writer cost only a back-reference.
    ///
    /// # Panics
    ///
    /// Panics if `root` resolves outside this image, i.e. it is a builtin
    /// or a node owned by a previously read image. Such nodes cannot be
    /// exported as symbols.
    pub fn write_tree(&mut self, root: NodeId, action: SymbolAction) -> Result<()> {
        self.out_tree(Some(root))?;
        let slot = self
            .cache
            .lookup(Handle::Tree(root))
            .expect("top-level symbol resolves outside this image");
        self.symbols.push((slot, action));
        Ok(())
    }

    /// Writes one tree reference or record.
    pub(crate) fn out_tree(&mut self, tree: Option<NodeId>) -> Result<()> {
        let Some(id) = tree else {
            self.tracer.tree(None);
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        let node = self.arena.node(id);
        self.tracer.tree(Some((node.kind, id.as_u32())));
        if self.begin_record(Handle::Tree(id), node.kind.as_u16()) {
            self.out_tree_body(id)?;
        }
        Ok(())
    }

    fn out_tree_body(&mut self, id: NodeId) -> Result<()> {
        let node = self.arena.node(id);
        self.out_uleb(u64::from(node.kind.as_u16()));
        if let Body::Call(call) = &node.body {
            self.out_uleb(call.args.len() as u64);
        }
        self.out_common(node)?;
        match node.kind {
            NodeKind::TranslationUnitDecl
            | NodeKind::NamespaceDecl
            | NodeKind::VarDecl
            | NodeKind::FunctionDecl
            | NodeKind::TypeDecl
            | NodeKind::TemplateDecl
            | NodeKind::ParmDecl
            | NodeKind::FieldDecl
            | NodeKind::ConstDecl
            | NodeKind::UsingDecl
            | NodeKind::LabelDecl
            | NodeKind::ResultDecl => self.out_decl_fields(id, node)?,
            NodeKind::VoidType
            | NodeKind::BooleanType
            | NodeKind::IntegerType
            | NodeKind::RealType
            | NodeKind::EnumeralType
            | NodeKind::PointerType
            | NodeKind::ReferenceType
            | NodeKind::NullptrType
            | NodeKind::ArrayType
            | NodeKind::FunctionType
            | NodeKind::MethodType
            | NodeKind::LangType
            | NodeKind::RecordType
            | NodeKind::UnionType
            | NodeKind::QualUnionType
            | NodeKind::TemplateTypeParm
            | NodeKind::TemplateTemplateParm
            | NodeKind::BoundTemplateTemplateParm
            | NodeKind::TypenameType
            | NodeKind::DecltypeType
            | NodeKind::TypeArgumentPack
            | NodeKind::TypePackExpansion
            | NodeKind::UnboundClassTemplate => self.out_type_fields(id, node)?,
            NodeKind::StatementList => {
                let Body::Stmts(stmts) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree_vec(stmts)?;
            }
            NodeKind::CallExpr | NodeKind::AggrInitExpr => {
                let Body::Call(call) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(call.function)?;
                for &arg in &call.args {
                    self.out_tree(Some(arg))?;
                }
            }
            NodeKind::IntegerCst => {
                let Body::IntCst { value } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_sleb(value);
            }
            NodeKind::RealCst => {
                let Body::RealCst { bits } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_uleb(bits);
            }
            NodeKind::StringCst => {
                let Body::StrCst { text } = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_str(Some(text));
            }
            NodeKind::PtrmemCst => {
                let Body::PtrmemCst { member } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(member)?;
            }
            NodeKind::IdentifierNode => {
                let Body::Ident(ident) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_str(Some(&ident.text));
                self.out_binding(ident.namespace_bindings)?;
                self.out_binding(ident.bindings)?;
                self.out_tree(ident.class_template_info)?;
                self.out_tree(ident.label_value)?;
            }
            NodeKind::TreeList => {
                let Body::List { purpose, value } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(purpose)?;
                self.out_tree(value)?;
                self.out_tree(node.chain)?;
            }
            NodeKind::TreeVec => {
                let Body::TreeVec(elements) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree_vec(elements)?;
            }
            NodeKind::TreeBinfo => {
                let Body::Binfo(binfo) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(binfo.btype)?;
                self.out_tree_vec(&binfo.bases)?;
                self.out_tree(binfo.vtable)?;
                self.out_tree(binfo.virtuals)?;
            }
            NodeKind::Overload => {
                let Body::Overload { function } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(function)?;
                self.out_tree(node.chain)?;
            }
            NodeKind::Baselink => {
                let Body::Baselink {
                    binfo,
                    functions,
                    access_binfo,
                } = node.body
                else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(binfo)?;
                self.out_tree(functions)?;
                self.out_tree(access_binfo)?;
            }
            NodeKind::TemplateInfo => {
                let Body::TemplateInfo(info) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(info.template)?;
                self.out_tree(info.args)?;
                self.out_uleb(info.typedefs.len() as u64);
                for use_ in &info.typedefs {
                    self.out_tree(use_.typedef_decl)?;
                    self.out_tree(use_.context)?;
                    self.out_location(use_.location.as_ref());
                }
            }
            NodeKind::TemplateParmIndex => {
                let Body::TemplateParmIndex(parm) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_uleb(u64::from(parm.index));
                self.out_uleb(u64::from(parm.level));
                self.out_uleb(u64::from(parm.orig_level));
                self.out_uleb(u64::from(parm.num_siblings));
                self.out_tree(parm.decl)?;
            }
            NodeKind::DefaultArg => {
                let Body::DefaultArg(arg) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_token_cache(&arg.tokens)?;
                self.out_tree_vec(&arg.instantiations)?;
            }
            NodeKind::StaticAssert => {
                let Body::StaticAssert { condition, message } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(condition)?;
                self.out_tree(message)?;
            }
            NodeKind::ArgumentPackSelect => {
                let Body::ArgumentPackSelect { pack, index } = node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(pack)?;
                self.out_uleb(u64::from(index));
            }
            NodeKind::TraitExpr => {
                let Body::TraitExpr {
                    type1,
                    type2,
                    trait_kind,
                } = node.body
                else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(type1)?;
                self.out_tree(type2)?;
                self.out_uleb(u64::from(trait_kind));
            }
            NodeKind::LambdaExpr => {
                let Body::Lambda(lambda) = &node.body else {
                    unreachable!("{:?} carries a mismatched body", node.kind)
                };
                self.out_tree(lambda.capture_list)?;
                self.out_tree(lambda.this_capture)?;
                self.out_tree(lambda.return_type)?;
                self.out_tree(lambda.extra_scope)?;
                self.out_uleb(u64::from(lambda.discriminator));
            }
            NodeKind::UsingStmt
            | NodeKind::TryBlock
            | NodeKind::EhSpecBlock
            | NodeKind::Handler
            | NodeKind::CleanupStmt
            | NodeKind::IfStmt
            | NodeKind::ForStmt
            | NodeKind::RangeForStmt
            | NodeKind::WhileStmt
            | NodeKind::DoStmt
            | NodeKind::BreakStmt
            | NodeKind::ContinueStmt
            | NodeKind::SwitchStmt
            | NodeKind::ExprStmt
            | NodeKind::TagDefn
            | NodeKind::NewExpr
            | NodeKind::VecNewExpr
            | NodeKind::DeleteExpr
            | NodeKind::VecDeleteExpr
            | NodeKind::TypeExpr
            | NodeKind::VecInitExpr
            | NodeKind::ThrowExpr
            | NodeKind::EmptyClassExpr
            | NodeKind::TemplateIdExpr
            | NodeKind::PseudoDtorExpr
            | NodeKind::ModopExpr
            | NodeKind::DotstarExpr
            | NodeKind::TypeidExpr
            | NodeKind::NonDependentExpr
            | NodeKind::CtorInitializer
            | NodeKind::MustNotThrowExpr
            | NodeKind::OffsetofExpr
            | NodeKind::SizeofExpr
            | NodeKind::AlignofExpr
            | NodeKind::ArrowExpr
            | NodeKind::StmtExpr
            | NodeKind::NontypeArgumentPack
            | NodeKind::ExprPackExpansion
            | NodeKind::CastExpr
            | NodeKind::ReinterpretCastExpr
            | NodeKind::ConstCastExpr
            | NodeKind::StaticCastExpr
            | NodeKind::DynamicCastExpr
            | NodeKind::NoexceptExpr
            | NodeKind::UnaryPlusExpr
            | NodeKind::MemberRef
            | NodeKind::OffsetRef
            | NodeKind::ScopeRef => self.out_operands(node)?,
            NodeKind::ImportedDecl
            | NodeKind::DebugExprDecl
            | NodeKind::ComplexType
            | NodeKind::FixedPointType
            | NodeKind::VectorType
            | NodeKind::OffsetType
            | NodeKind::TypeofType => {
                self.tracer.unimplemented(node.kind);
            }
        }
        Ok(())
    }

    /// The part every tree record shares: flags, name, type, location.
    fn out_common(&mut self, node: &Node) -> Result<()> {
        let mut bp = BitPacker::new();
        for index in 0..NodeFlags::LANG_FLAGS {
            bp.push_bool(node.flags.lang_flag(index));
        }
        bp.push_bool(node.flags.builtin());
        self.out_bitpack(bp);
        self.out_tree(node.name)?;
        self.out_tree(node.ttype)?;
        self.out_location(node.location.as_ref());
        Ok(())
    }

    fn out_decl_fields(&mut self, id: NodeId, node: &Node) -> Result<()> {
        let Body::Decl(decl) = &node.body else {
            unreachable!("{:?} carries a mismatched body", node.kind)
        };
        let mut bp = BitPacker::new();
        bp.push::<9>(u32::from(decl.lang_flags));
        self.out_bitpack(bp);
        self.out_tree(decl.context)?;
        self.out_tree(decl.initial)?;
        match node.kind {
            NodeKind::FunctionDecl => {
                self.out_chain(decl.arguments)?;
                self.out_tree(decl.result)?;
                self.out_tree(decl.saved_tree)?;
            }
            NodeKind::TypeDecl => self.out_tree(decl.original_type)?,
            NodeKind::TemplateDecl => {
                self.out_tree(decl.template_result)?;
                self.out_tree(decl.template_parms)?;
            }
            _ => {}
        }
        self.out_lang_decl(id, decl.lang.as_deref())
    }

    fn out_type_fields(&mut self, id: NodeId, node: &Node) -> Result<()> {
        let Body::Type(ttype) = &node.body else {
            unreachable!("{:?} carries a mismatched body", node.kind)
        };
        let mut bp = BitPacker::new();
        bp.push::<7>(u32::from(ttype.lang_flags));
        self.out_bitpack(bp);
        self.out_tree(ttype.values)?;
        self.out_tree(ttype.minval)?;
        self.out_tree(ttype.maxval)?;
        if matches!(
            node.kind,
            NodeKind::RecordType | NodeKind::UnionType | NodeKind::QualUnionType
        ) {
            self.out_tree(ttype.binfo)?;
        }
        self.out_lang_type(id, ttype.lang.as_deref())
    }

    fn out_operands(&mut self, node: &Node) -> Result<()> {
        let Body::Operands(operands) = &node.body else {
            unreachable!("{:?} carries a mismatched body", node.kind)
        };
        assert!(
            operands.len() == node.kind.operand_count(),
            "{:?} node carries {} operands, expected {}",
            node.kind,
            operands.len(),
            node.kind.operand_count()
        );
        for &operand in operands {
            self.out_tree(operand)?;
        }
        Ok(())
    }

    // --- CHAINS AND LISTS ---

    /// Writes a node chain as a counted list of elements.
    pub(crate) fn out_chain(&mut self, head: Option<NodeId>) -> Result<()> {
        self.out_chain_filtered(head, |_| true)
    }

    /// Writes a node chain, keeping only the elements `keep` accepts.
    ///
    /// The in-memory chain is not touched; dropped elements simply do not
    /// appear in the count or the list, and the decoder links the
    /// survivors directly to each other.
    pub(crate) fn out_chain_filtered<F>(&mut self, head: Option<NodeId>, keep: F) -> Result<()>
    where
        F: Fn(&Node) -> bool,
    {
        let arena = self.arena;
        let count = arena
            .chain_iter(head)
            .filter(|&id| keep(arena.node(id)))
            .count();
        self.tracer.chain(count as u32);
        self.out_uleb(count as u64);
        for id in arena.chain_iter(head) {
            if keep(arena.node(id)) {
                self.out_tree(Some(id))?;
            }
        }
        Ok(())
    }

    /// Writes a counted vector of trees.
    pub(crate) fn out_tree_vec(&mut self, elements: &[NodeId]) -> Result<()> {
        self.out_uleb(elements.len() as u64);
        for &element in elements {
            self.out_tree(Some(element))?;
        }
        Ok(())
    }

    fn out_pairs(&mut self, pairs: &[TreePair]) -> Result<()> {
        self.out_uleb(pairs.len() as u64);
        for pair in pairs {
            self.out_tree(pair.purpose)?;
            self.out_tree(pair.value)?;
        }
        Ok(())
    }

    fn out_token_cache(&mut self, tokens: &TokenCache) -> Result<()> {
        let blob = tokens.to_blob()?;
        self.out_bytes(&blob);
        Ok(())
    }

    // --- SCOPES AND BINDINGS ---

    /// Writes a binding scope record, recursing into its parent chain.
    pub(crate) fn out_scope(&mut self, scope: Option<ScopeId>) -> Result<()> {
        let Some(id) = scope else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if !self.begin_record(Handle::Scope(id), 0) {
            return Ok(());
        }
        let arena = self.arena;
        let scope = arena.scope(id);
        let mut bp = BitPacker::new();
        bp.push::<4>(scope.kind as u32);
        bp.push_bool(scope.keep);
        bp.push_bool(scope.more_cleanups_ok);
        bp.push_bool(scope.have_cleanups);
        self.out_bitpack(bp);
        self.out_tree(scope.this_entity)?;
        self.out_chain_filtered(scope.names, |n| !n.is_builtin_decl())?;
        self.out_chain_filtered(scope.namespaces, |n| !n.is_builtin_decl())?;
        self.out_tree_vec(&scope.static_decls)?;
        self.out_chain(scope.usings)?;
        self.out_chain(scope.using_directives)?;
        self.out_uleb(scope.class_shadowed.len() as u64);
        for (index, shadowed) in scope.class_shadowed.iter().enumerate() {
            self.out_class_binding(id, index as u32, shadowed)?;
        }
        self.out_tree(scope.type_shadowed)?;
        self.out_uleb(scope.shadowed_labels.len() as u64);
        for (index, shadowed) in scope.shadowed_labels.iter().enumerate() {
            self.out_label_binding(id, index as u32, shadowed)?;
        }
        self.out_chain(scope.blocks)?;
        self.out_tree_vec(&scope.dead_vars_from_for)?;
        self.out_tree(scope.statement_list)?;
        self.out_uleb(u64::from(scope.binding_depth));
        self.out_scope(scope.level_chain)
    }

    /// Writes a name binding record, recursing into the stack it shadows.
    pub(crate) fn out_binding(&mut self, binding: Option<BindingId>) -> Result<()> {
        let Some(id) = binding else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if !self.begin_record(Handle::Binding(id), 0) {
            return Ok(());
        }
        let binding = self.arena.binding(id);
        let mut bp = BitPacker::new();
        bp.push_bool(binding.value_is_inherited);
        bp.push_bool(binding.is_local);
        self.out_bitpack(bp);
        self.out_tree(binding.value)?;
        self.out_tree(binding.ttype)?;
        self.out_scope(binding.scope)?;
        self.out_binding(binding.previous)
    }

    fn out_class_binding(
        &mut self,
        owner: ScopeId,
        index: u32,
        shadowed: &ClassBinding,
    ) -> Result<()> {
        if self.begin_record(Handle::ClassBinding(owner, index), 0) {
            self.out_tree(shadowed.identifier)?;
            self.out_binding(shadowed.base)?;
        }
        Ok(())
    }

    fn out_label_binding(
        &mut self,
        owner: ScopeId,
        index: u32,
        shadowed: &LabelBinding,
    ) -> Result<()> {
        if self.begin_record(Handle::LabelBinding(owner, index), 0) {
            self.out_tree(shadowed.label)?;
            self.out_tree(shadowed.prev_value)?;
        }
        Ok(())
    }

    // --- LANGUAGE-SPECIFIC EXTENSIONS ---

    fn out_lang_decl(&mut self, owner: NodeId, lang: Option<&LangDecl>) -> Result<()> {
        let Some(ld) = lang else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if !self.begin_record(Handle::LangDecl(owner), 0) {
            return Ok(());
        }
        let mut bp = BitPacker::new();
        bp.push::<16>(ld.payload.selector());
        bp.push::<4>(ld.language as u32);
        bp.push::<2>(u32::from(ld.use_template));
        bp.push_bool(ld.not_really_extern);
        bp.push_bool(ld.initialized_in_class);
        bp.push_bool(ld.repo_available);
        bp.push_bool(ld.threadprivate_or_deleted);
        bp.push_bool(ld.anticipated);
        bp.push_bool(ld.friend_or_tls);
        bp.push_bool(ld.template_conv);
        bp.push_bool(ld.odr_used);
        bp.push_bool(secondary_is_discriminator(&ld.payload));
        self.out_bitpack(bp);
        match &ld.payload {
            LangDeclPayload::Min(min) => self.out_lang_decl_min(min),
            LangDeclPayload::Fn(function) => {
                self.out_lang_decl_min(&function.min)?;
                self.out_lang_decl_fn(owner, function)
            }
            LangDeclPayload::Ns(ns) => self.out_scope(ns.level),
            LangDeclPayload::Parm(parm) => {
                self.out_uleb(u64::from(parm.level));
                self.out_uleb(u64::from(parm.index));
                Ok(())
            }
        }
    }

    fn out_lang_decl_min(&mut self, min: &LangDeclMin) -> Result<()> {
        self.out_tree(min.template_info)?;
        match &min.secondary {
            MinSecondary::Access(access) => self.out_tree(*access)?,
            MinSecondary::Discriminator(discriminator) => {
                self.out_uleb(u64::from(*discriminator));
            }
        }
        Ok(())
    }

    fn out_lang_decl_fn(&mut self, owner: NodeId, function: &LangDeclFn) -> Result<()> {
        let mut bp = BitPacker::new();
        bp.push::<16>(u32::from(function.operator_code));
        bp.push_bool(function.global_ctor);
        bp.push_bool(function.global_dtor);
        bp.push_bool(function.constructor_attr);
        bp.push_bool(function.destructor_attr);
        bp.push_bool(function.assignment_operator);
        bp.push_bool(function.static_function);
        bp.push_bool(function.pure_virtual);
        bp.push_bool(function.defaulted);
        bp.push_bool(function.has_in_charge_parm);
        bp.push_bool(function.has_vtt_parm);
        bp.push_bool(function.nonconverting);
        bp.push_bool(function.this_thunk);
        bp.push_bool(function.hidden_friend);
        bp.push_bool(matches!(function.thunk, ThunkDetail::FixedOffset(_)));
        bp.push_bool(matches!(function.pending, PendingBody::Tokens(_)));
        self.out_bitpack(bp);
        self.out_tree(function.befriending_classes)?;
        self.out_tree(function.context)?;
        match &function.thunk {
            ThunkDetail::Cloned(cloned) => self.out_tree(*cloned)?,
            ThunkDetail::FixedOffset(offset) => self.out_sleb(*offset),
        }
        match &function.pending {
            PendingBody::Tokens(tokens) => self.out_token_cache(tokens),
            PendingBody::Saved(saved) => self.out_function(owner, saved.as_deref()),
        }
    }

    /// Writes the saved parsing state of a function declaration.
    pub(crate) fn out_function(&mut self, owner: NodeId, function: Option<&Function>) -> Result<()> {
        let Some(f) = function else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if !self.begin_record(Handle::Function(owner), 0) {
            return Ok(());
        }
        let mut bp = BitPacker::new();
        bp.push_bool(f.stmts_are_full_exprs);
        bp.push_bool(f.returns_value);
        bp.push_bool(f.returns_null);
        bp.push_bool(f.returns_abnormally);
        bp.push_bool(f.in_function_try_handler);
        bp.push_bool(f.in_base_initializer);
        bp.push_bool(f.can_throw);
        self.out_bitpack(bp);
        self.out_tree_vec(&f.statements)?;
        self.out_tree(f.cdtor_label)?;
        self.out_tree(f.current_class_ptr)?;
        self.out_tree(f.current_class_ref)?;
        self.out_tree(f.eh_spec_block)?;
        self.out_tree(f.in_charge_parm)?;
        self.out_tree(f.vtt_parm)?;
        self.out_tree(f.return_value)?;
        self.out_scope(f.bindings)?;
        self.out_tree_vec(&f.local_names)
    }

    fn out_lang_type(&mut self, owner: NodeId, lang: Option<&LangType>) -> Result<()> {
        let Some(lt) = lang else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if !self.begin_record(Handle::LangType(owner), 0) {
            return Ok(());
        }
        let mut bp = BitPacker::new();
        bp.push_bool(lt.has_type_conversion);
        bp.push_bool(lt.has_init_ref);
        bp.push_bool(lt.has_default_ctor);
        bp.push_bool(lt.const_init_ref);
        bp.push_bool(lt.has_new);
        bp.push_bool(lt.has_array_new);
        bp.push_bool(matches!(lt.payload, LangTypePayload::Class(_)));
        self.out_bitpack(bp);
        match &lt.payload {
            LangTypePayload::Class(class) => self.out_class_type(owner, class),
            LangTypePayload::Ptrmem(ptrmem) => self.out_tree(ptrmem.record),
        }
    }

    fn out_class_type(&mut self, owner: NodeId, class: &LangTypeClass) -> Result<()> {
        self.out_uleb(u64::from(class.align));
        let mut bp = BitPacker::new();
        bp.push_bool(class.has_mutable);
        bp.push_bool(class.com_interface);
        bp.push_bool(class.non_pod_class);
        bp.push_bool(class.nearly_empty);
        bp.push_bool(class.user_align);
        bp.push_bool(class.declared_class);
        bp.push_bool(class.repeated_base);
        bp.push_bool(class.diamond_shaped);
        bp.push_bool(class.being_defined);
        bp.push_bool(class.debug_requested);
        bp.push_bool(class.fields_readonly);
        bp.push::<2>(u32::from(class.use_template));
        bp.push_bool(class.ptrmemfunc_flag);
        bp.push_bool(class.was_anonymous);
        bp.push_bool(class.lazy_default_ctor);
        bp.push_bool(class.lazy_copy_ctor);
        bp.push_bool(class.lazy_copy_assign);
        bp.push_bool(class.lazy_destructor);
        bp.push_bool(class.lazy_move_ctor);
        bp.push_bool(class.lazy_move_assign);
        bp.push_bool(class.has_complex_copy_ctor);
        bp.push_bool(class.has_complex_copy_assign);
        bp.push_bool(class.has_complex_move_ctor);
        bp.push_bool(class.has_complex_move_assign);
        bp.push_bool(class.has_complex_dflt);
        bp.push_bool(class.has_list_ctor);
        bp.push_bool(class.has_constexpr_ctor);
        bp.push_bool(class.non_aggregate);
        bp.push_bool(class.non_std_layout);
        bp.push_bool(class.is_literal);
        self.out_bitpack(bp);
        self.out_tree(class.primary_base)?;
        self.out_pairs(&class.vcall_indices)?;
        self.out_tree(class.vtables)?;
        self.out_tree(class.typeinfo_var)?;
        self.out_tree_vec(&class.vbases)?;
        self.out_pairs(&class.nested_udts)?;
        self.out_tree(class.as_base)?;
        self.out_tree_vec(&class.pure_virtuals)?;
        self.out_tree(class.friend_classes)?;
        self.out_tree_vec(&class.methods)?;
        self.out_tree(class.key_method)?;
        self.out_tree(class.decl_list)?;
        self.out_tree(class.template_info)?;
        self.out_tree(class.befriending_classes)?;
        self.out_sorted_fields(owner, class.sorted_fields.as_deref())?;
        self.out_tree(class.lambda_expr)
    }

    fn out_sorted_fields(&mut self, owner: NodeId, fields: Option<&[NodeId]>) -> Result<()> {
        let Some(fields) = fields else {
            self.out_marker(RecordMarker::End);
            return Ok(());
        };
        if self.begin_record(Handle::SortedFields(owner), 0) {
            self.out_tree_vec(fields)?;
        }
        Ok(())
    }
}

fn secondary_is_discriminator(payload: &LangDeclPayload) -> bool {
    let min = match payload {
        LangDeclPayload::Min(min) => min,
        LangDeclPayload::Fn(function) => &function.min,
        LangDeclPayload::Ns(_) | LangDeclPayload::Parm(_) => return false,
    };
    matches!(min.secondary, MinSecondary::Discriminator(_))
}
