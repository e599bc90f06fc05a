//! Record decoding.
//!
//! The mirror of the encoder: every read here consumes exactly what the
//! corresponding write produced, in the same order. The load-bearing
//! rule is that a record is materialized and registered in the pickle
//! cache at its announced slot *before* its fields are read, so a field
//! that circles back to the record under construction resolves to the
//! already assigned identity instead of recursing forever.
//!
//! Validation that happens before any node is materialized (the include
//! manifest) is recoverable and surfaces as
//! [`TreepackError::Format`](crate::TreepackError::Format). A stream
//! that contradicts itself mid-record aborts instead; see the crate
//! error policy.

use crate::bitpack::BitUnpacker;
use crate::cache::{DecodedImage, Handle, PickleCache, Preloaded, ReadSet, Symbol, SymbolAction};
use crate::error::{Result, TreepackError};
use crate::format::{RecordMarker, SectionId, read_sleb, read_uleb};
use crate::reader::ImageReader;
use crate::strings::StringView;
use crate::tokens::TokenCache;
use crate::trace::{Direction, Tracer};
use crate::tree::node::{
    BinfoBody, Binding, Body, CallBody, ClassBinding, DeclBody, DefaultArgBody, Function,
    IdentBody, LabelBinding, LangDecl, LangDeclFn, LangDeclMin, LangDeclNs, LangDeclParm,
    LangDeclPayload, LangType, LangTypeClass, LangTypePayload, LangTypePtrmem, Language,
    LambdaBody, MinSecondary, Node, NodeFlags, PendingBody, QualifiedTypedefUse, Scope, ScopeKind,
    SourceLocation, TemplateInfoBody, TemplateParmIndexBody, ThunkDetail, TreePair, TypeBody,
};
use crate::tree::{Arena, BindingId, NodeId, NodeKind, ScopeId};

impl ImageReader {
    /// Decodes the node data carried by this image into `arena`.
    ///
    /// The include manifest is validated against `read_set` first: the
    /// images this one was written over must be registered, in the same
    /// order, under the same names. On success the image's pickle cache
    /// and symbol table are returned; registering the result in the read
    /// set makes its nodes available to external references from later
    /// images.
    ///
    /// # Panics
    ///
    /// Panics if the record stream contradicts itself: an unknown marker
    /// or selector, a slot bound twice, a reference table that disagrees
    /// with the decoded stream.
    pub fn read_body(
        &self,
        arena: &mut Arena,
        read_set: &ReadSet,
        preloaded: &'static Preloaded,
    ) -> Result<DecodedImage> {
        self.validate_includes(read_set)?;

        let main = self.section_bytes(SectionId::Main)?;
        let mut decoder = TreeDecoder {
            bytes: &main[..],
            pos: 0,
            strings: self.strings(),
            cache: PickleCache::new(),
            arena,
            read_set,
            preloaded,
            tracer: Tracer::new(self.name(), Direction::Read, self.config()),
        };
        while decoder.pos < decoder.bytes.len() {
            decoder.read_tree()?;
        }

        let references = self.slot_refs()?;
        assert!(
            decoder.cache.len() as u64 == self.slot_count(),
            "record stream corrupt: the stream assigned {} slots, the reference table lists {}",
            decoder.cache.len(),
            self.slot_count()
        );
        for (slot, (entry, reference)) in
            decoder.cache.entries().iter().zip(&references).enumerate()
        {
            assert!(
                entry.handle.tag() == reference.tag,
                "record stream corrupt: slot {slot} holds a {:?} record, \
                 the reference table says {:?}",
                entry.handle.tag(),
                reference.tag
            );
        }

        let symbols = self.read_symtab(&decoder.cache)?;
        let cache = decoder.cache;
        Ok(DecodedImage::new(self.name().to_owned(), cache, symbols))
    }

    /// Checks the include manifest against the registered read set.
    fn validate_includes(&self, read_set: &ReadSet) -> Result<()> {
        let bytes = self.section_bytes(SectionId::Includes)?;
        let strings = self.strings();
        let mut pos = 0;
        let count = read_uleb(&bytes, &mut pos);
        if count != read_set.len() as u64 {
            return Err(TreepackError::Format(format!(
                "Include manifest mismatch: image was written over {count} images, \
                 {} are registered",
                read_set.len()
            )));
        }
        for index in 0..count as u32 {
            let offset = read_uleb(&bytes, &mut pos) as u32;
            let written = strings.get(offset);
            let registered = read_set.image(index).name();
            if written != registered {
                return Err(TreepackError::Format(format!(
                    "Include manifest mismatch at position {index}: image expects \
                     {written:?}, the read set holds {registered:?}"
                )));
            }
        }
        Ok(())
    }

    /// Reads the symbol table, resolving slots through the decoded cache.
    fn read_symtab(&self, cache: &PickleCache) -> Result<Vec<Symbol>> {
        let bytes = self.section_bytes(SectionId::Symtab)?;
        let mut pos = 0;
        let count = read_uleb(&bytes, &mut pos);
        let mut symbols = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let slot = read_uleb(&bytes, &mut pos) as u32;
            let raw = read_uleb(&bytes, &mut pos) as u32;
            let Some(action) = SymbolAction::from_u32(raw) else {
                unreachable!("record stream corrupt: unknown symbol action {raw}")
            };
            let node = cache.handle_at(slot).expect_tree();
            symbols.push(Symbol { node, action });
        }
        Ok(symbols)
    }
}

/// Cursor over the main section of one image.
struct TreeDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    strings: StringView<'a>,
    cache: PickleCache,
    arena: &'a mut Arena,
    read_set: &'a ReadSet,
    preloaded: &'static Preloaded,
    tracer: Tracer,
}

impl<'a> TreeDecoder<'a> {
    // --- PRIMITIVES ---

    fn in_marker(&mut self) -> RecordMarker {
        assert!(
            self.pos < self.bytes.len(),
            "record stream corrupt: truncated at a record marker"
        );
        let byte = self.bytes[self.pos];
        self.pos += 1;
        let Some(marker) = RecordMarker::from_u8(byte) else {
            unreachable!("record stream corrupt: unknown record marker {byte:#04x}")
        };
        marker
    }

    fn in_slot(&mut self) -> u32 {
        read_uleb(self.bytes, &mut self.pos) as u32
    }

    fn in_uleb(&mut self) -> u64 {
        let value = read_uleb(self.bytes, &mut self.pos);
        self.tracer.uint(value);
        value
    }

    fn in_sleb(&mut self) -> i64 {
        let value = read_sleb(self.bytes, &mut self.pos);
        self.tracer.int(value);
        value
    }

    fn in_str(&mut self) -> Option<&'a str> {
        let raw = read_uleb(self.bytes, &mut self.pos);
        let value = match raw {
            0 => None,
            offset => Some(self.strings.get((offset - 1) as u32)),
        };
        self.tracer.string(value);
        value
    }

    fn in_location(&mut self) -> Option<SourceLocation> {
        let raw = read_uleb(self.bytes, &mut self.pos);
        if raw == 0 {
            self.tracer.location(None, 0, 0);
            return None;
        }
        let file = self.strings.get((raw - 1) as u32);
        let line = read_uleb(self.bytes, &mut self.pos) as u32;
        let column = read_uleb(self.bytes, &mut self.pos) as u32;
        self.tracer.location(Some(file), line, column);
        Some(SourceLocation {
            file: file.to_owned(),
            line,
            column,
        })
    }

    fn in_bytes(&mut self) -> &'a [u8] {
        let len = read_uleb(self.bytes, &mut self.pos) as usize;
        let end = self.pos.checked_add(len).unwrap_or(usize::MAX);
        assert!(
            end <= self.bytes.len(),
            "record stream corrupt: byte blob overruns the section"
        );
        let blob = &self.bytes[self.pos..end];
        self.pos = end;
        self.tracer.bytes(len);
        blob
    }

    /// Consumes the framing of a record that is owned by its parent and
    /// therefore may only be absent or start here, never a reference.
    fn in_owned_start(&mut self, what: &str) -> Option<u32> {
        match self.in_marker() {
            RecordMarker::End => {
                self.tracer.marker(RecordMarker::End, None);
                None
            }
            RecordMarker::Start => {
                let slot = self.in_slot();
                self.tracer.marker(RecordMarker::Start, Some(slot));
                Some(slot)
            }
            other => unreachable!(
                "record stream corrupt: {what} is owned by its parent \
                 and cannot be a back-reference ({other:?})"
            ),
        }
    }

    /// Consumes the framing of a record that is always present.
    fn in_required_start(&mut self, what: &str) -> u32 {
        match self.in_marker() {
            RecordMarker::Start => {
                let slot = self.in_slot();
                self.tracer.marker(RecordMarker::Start, Some(slot));
                slot
            }
            other => {
                unreachable!("record stream corrupt: {what} must open a record, found {other:?}")
            }
        }
    }

    // --- TREE RECORDS ---

    /// Reads one tree reference or record.
    fn read_tree(&mut self) -> Result<Option<NodeId>> {
        let marker = self.in_marker();
        match marker {
            RecordMarker::End => {
                self.tracer.marker(marker, None);
                self.tracer.tree(None);
                Ok(None)
            }
            RecordMarker::InternalRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.cache.handle_at(slot).expect_tree()))
            }
            RecordMarker::ExternalRef => {
                let image = self.in_slot();
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                let cache = self.read_set.image(image).cache();
                Ok(Some(cache.handle_at(slot).expect_tree()))
            }
            RecordMarker::PreloadedRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.preloaded.handle_at(slot).expect_tree()))
            }
            RecordMarker::Start => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                self.read_tree_record(slot).map(Some)
            }
        }
    }

    fn read_required_tree(&mut self, what: &str) -> Result<NodeId> {
        match self.read_tree()? {
            Some(id) => Ok(id),
            None => unreachable!("record stream corrupt: {what} must not be null"),
        }
    }

    fn read_tree_record(&mut self, slot: u32) -> Result<NodeId> {
        let code = self.in_uleb() as u16;
        let Some(kind) = NodeKind::from_u16(code) else {
            unreachable!("record stream corrupt: unknown node kind code {code}")
        };
        let arity = match kind {
            NodeKind::CallExpr | NodeKind::AggrInitExpr => self.in_uleb() as usize,
            _ => 0,
        };
        let id = self.arena.push_node(Node::new(kind));
        self.cache.insert_at(Handle::Tree(id), slot);
        self.tracer.tree(Some((kind, id.as_u32())));
        self.read_common(id)?;
        match kind {
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
            | NodeKind::ResultDecl => self.read_decl_fields(id, kind)?,
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
            | NodeKind::UnboundClassTemplate => self.read_type_fields(id, kind)?,
            NodeKind::StatementList => {
                let stmts = self.read_tree_vec()?;
                self.arena.node_mut(id).body = Body::Stmts(stmts);
            }
            NodeKind::CallExpr | NodeKind::AggrInitExpr => {
                let function = self.read_tree()?;
                let mut args = Vec::with_capacity(arity);
                for _ in 0..arity {
                    args.push(self.read_required_tree("a call argument")?);
                }
                self.arena.node_mut(id).body = Body::Call(CallBody { function, args });
            }
            NodeKind::IntegerCst => {
                let value = self.in_sleb();
                self.arena.node_mut(id).body = Body::IntCst { value };
            }
            NodeKind::RealCst => {
                let bits = self.in_uleb();
                self.arena.node_mut(id).body = Body::RealCst { bits };
            }
            NodeKind::StringCst => {
                let Some(text) = self.in_str() else {
                    unreachable!("record stream corrupt: string constant without text")
                };
                self.arena.node_mut(id).body = Body::StrCst {
                    text: text.to_owned(),
                };
            }
            NodeKind::PtrmemCst => {
                let member = self.read_tree()?;
                self.arena.node_mut(id).body = Body::PtrmemCst { member };
            }
            NodeKind::IdentifierNode => {
                let Some(text) = self.in_str() else {
                    unreachable!("record stream corrupt: identifier without a spelling")
                };
                let text = text.to_owned();
                let namespace_bindings = self.read_binding()?;
                let bindings = self.read_binding()?;
                let class_template_info = self.read_tree()?;
                let label_value = self.read_tree()?;
                self.arena.node_mut(id).body = Body::Ident(IdentBody {
                    text,
                    namespace_bindings,
                    bindings,
                    class_template_info,
                    label_value,
                });
            }
            NodeKind::TreeList => {
                let purpose = self.read_tree()?;
                let value = self.read_tree()?;
                let chain = self.read_tree()?;
                let node = self.arena.node_mut(id);
                node.body = Body::List { purpose, value };
                node.chain = chain;
            }
            NodeKind::TreeVec => {
                let elements = self.read_tree_vec()?;
                self.arena.node_mut(id).body = Body::TreeVec(elements);
            }
            NodeKind::TreeBinfo => {
                let btype = self.read_tree()?;
                let bases = self.read_tree_vec()?;
                let vtable = self.read_tree()?;
                let virtuals = self.read_tree()?;
                self.arena.node_mut(id).body = Body::Binfo(BinfoBody {
                    btype,
                    bases,
                    vtable,
                    virtuals,
                });
            }
            NodeKind::Overload => {
                let function = self.read_tree()?;
                let chain = self.read_tree()?;
                let node = self.arena.node_mut(id);
                node.body = Body::Overload { function };
                node.chain = chain;
            }
            NodeKind::Baselink => {
                let binfo = self.read_tree()?;
                let functions = self.read_tree()?;
                let access_binfo = self.read_tree()?;
                self.arena.node_mut(id).body = Body::Baselink {
                    binfo,
                    functions,
                    access_binfo,
                };
            }
            NodeKind::TemplateInfo => {
                let template = self.read_tree()?;
                let args = self.read_tree()?;
                let count = self.in_uleb();
                let mut typedefs = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let typedef_decl = self.read_tree()?;
                    let context = self.read_tree()?;
                    let location = self.in_location();
                    typedefs.push(QualifiedTypedefUse {
                        typedef_decl,
                        context,
                        location,
                    });
                }
                self.arena.node_mut(id).body = Body::TemplateInfo(TemplateInfoBody {
                    template,
                    args,
                    typedefs,
                });
            }
            NodeKind::TemplateParmIndex => {
                let index = self.in_uleb() as u32;
                let level = self.in_uleb() as u32;
                let orig_level = self.in_uleb() as u32;
                let num_siblings = self.in_uleb() as u32;
                let decl = self.read_tree()?;
                self.arena.node_mut(id).body = Body::TemplateParmIndex(TemplateParmIndexBody {
                    index,
                    level,
                    orig_level,
                    num_siblings,
                    decl,
                });
            }
            NodeKind::DefaultArg => {
                let tokens = self.read_token_cache()?;
                let instantiations = self.read_tree_vec()?;
                self.arena.node_mut(id).body = Body::DefaultArg(DefaultArgBody {
                    tokens,
                    instantiations,
                });
            }
            NodeKind::StaticAssert => {
                let condition = self.read_tree()?;
                let message = self.read_tree()?;
                self.arena.node_mut(id).body = Body::StaticAssert { condition, message };
            }
            NodeKind::ArgumentPackSelect => {
                let pack = self.read_tree()?;
                let index = self.in_uleb() as u32;
                self.arena.node_mut(id).body = Body::ArgumentPackSelect { pack, index };
            }
            NodeKind::TraitExpr => {
                let type1 = self.read_tree()?;
                let type2 = self.read_tree()?;
                let trait_kind = self.in_uleb() as u32;
                self.arena.node_mut(id).body = Body::TraitExpr {
                    type1,
                    type2,
                    trait_kind,
                };
            }
            NodeKind::LambdaExpr => {
                let capture_list = self.read_tree()?;
                let this_capture = self.read_tree()?;
                let return_type = self.read_tree()?;
                let extra_scope = self.read_tree()?;
                let discriminator = self.in_uleb() as u32;
                self.arena.node_mut(id).body = Body::Lambda(LambdaBody {
                    capture_list,
                    this_capture,
                    return_type,
                    extra_scope,
                    discriminator,
                });
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
            | NodeKind::ScopeRef => self.read_operands(id, kind)?,
            NodeKind::ImportedDecl
            | NodeKind::DebugExprDecl
            | NodeKind::ComplexType
            | NodeKind::FixedPointType
            | NodeKind::VectorType
            | NodeKind::OffsetType
            | NodeKind::TypeofType => {
                self.tracer.unimplemented(kind);
            }
        }
        Ok(id)
    }

    /// The part every tree record shares: flags, name, type, location.
    fn read_common(&mut self, id: NodeId) -> Result<()> {
        let mut unpacker = BitUnpacker::new();
        let mut flags = NodeFlags::default();
        for index in 0..NodeFlags::LANG_FLAGS {
            flags.set_lang_flag(index, unpacker.pull_bool(self.bytes, &mut self.pos));
        }
        flags.set_builtin(unpacker.pull_bool(self.bytes, &mut self.pos));
        self.tracer.bitpack(unpacker.words_fetched());
        let name = self.read_tree()?;
        let ttype = self.read_tree()?;
        let location = self.in_location();
        let node = self.arena.node_mut(id);
        node.flags = flags;
        node.name = name;
        node.ttype = ttype;
        node.location = location;
        Ok(())
    }

    fn read_decl_fields(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let mut unpacker = BitUnpacker::new();
        let lang_flags = unpacker.pull::<9>(self.bytes, &mut self.pos) as u16;
        self.tracer.bitpack(unpacker.words_fetched());
        let mut decl = DeclBody {
            lang_flags,
            ..DeclBody::default()
        };
        decl.context = self.read_tree()?;
        decl.initial = self.read_tree()?;
        match kind {
            NodeKind::FunctionDecl => {
                let (arguments, _) = self.in_chain()?;
                decl.arguments = arguments;
                decl.result = self.read_tree()?;
                decl.saved_tree = self.read_tree()?;
            }
            NodeKind::TypeDecl => decl.original_type = self.read_tree()?,
            NodeKind::TemplateDecl => {
                decl.template_result = self.read_tree()?;
                decl.template_parms = self.read_tree()?;
            }
            _ => {}
        }
        decl.lang = self.read_lang_decl(id)?.map(Box::new);
        self.arena.node_mut(id).body = Body::Decl(decl);
        Ok(())
    }

    fn read_type_fields(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let mut unpacker = BitUnpacker::new();
        let lang_flags = unpacker.pull::<7>(self.bytes, &mut self.pos) as u8;
        self.tracer.bitpack(unpacker.words_fetched());
        let mut ttype = TypeBody {
            lang_flags,
            ..TypeBody::default()
        };
        ttype.values = self.read_tree()?;
        ttype.minval = self.read_tree()?;
        ttype.maxval = self.read_tree()?;
        if matches!(
            kind,
            NodeKind::RecordType | NodeKind::UnionType | NodeKind::QualUnionType
        ) {
            ttype.binfo = self.read_tree()?;
        }
        ttype.lang = self.read_lang_type(id)?.map(Box::new);
        self.arena.node_mut(id).body = Body::Type(ttype);
        Ok(())
    }

    fn read_operands(&mut self, id: NodeId, kind: NodeKind) -> Result<()> {
        let mut operands = Vec::with_capacity(kind.operand_count());
        for _ in 0..kind.operand_count() {
            operands.push(self.read_tree()?);
        }
        self.arena.node_mut(id).body = Body::Operands(operands);
        Ok(())
    }

    // --- CHAINS AND LISTS ---

    /// Reads a counted element list, relinks the elements into a chain
    /// and returns its head and length.
    fn in_chain(&mut self) -> Result<(Option<NodeId>, u32)> {
        let count = self.in_uleb() as u32;
        self.tracer.chain(count);
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(self.read_required_tree("a chain element")?);
        }
        for window in elements.windows(2) {
            self.arena.node_mut(window[0]).chain = Some(window[1]);
        }
        if let Some(&last) = elements.last() {
            self.arena.node_mut(last).chain = None;
        }
        Ok((elements.first().copied(), count))
    }

    fn read_tree_vec(&mut self) -> Result<Vec<NodeId>> {
        let count = self.in_uleb();
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(self.read_required_tree("a counted vector element")?);
        }
        Ok(elements)
    }

    fn read_pairs(&mut self) -> Result<Vec<TreePair>> {
        let count = self.in_uleb();
        let mut pairs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let purpose = self.read_tree()?;
            let value = self.read_tree()?;
            pairs.push(TreePair { purpose, value });
        }
        Ok(pairs)
    }

    fn read_token_cache(&mut self) -> Result<TokenCache> {
        let blob = self.in_bytes();
        TokenCache::from_blob(blob)
    }

    // --- SCOPES AND BINDINGS ---

    /// Reads a scope reference or record, recursing into the parent
    /// chain.
    fn read_scope(&mut self) -> Result<Option<ScopeId>> {
        let marker = self.in_marker();
        match marker {
            RecordMarker::End => {
                self.tracer.marker(marker, None);
                Ok(None)
            }
            RecordMarker::InternalRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.cache.handle_at(slot).expect_scope()))
            }
            RecordMarker::ExternalRef => {
                let image = self.in_slot();
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                let cache = self.read_set.image(image).cache();
                Ok(Some(cache.handle_at(slot).expect_scope()))
            }
            RecordMarker::PreloadedRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.preloaded.handle_at(slot).expect_scope()))
            }
            RecordMarker::Start => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                self.read_scope_record(slot).map(Some)
            }
        }
    }

    fn read_scope_record(&mut self, slot: u32) -> Result<ScopeId> {
        let id = self.arena.push_scope(Scope::default());
        self.cache.insert_at(Handle::Scope(id), slot);
        let mut unpacker = BitUnpacker::new();
        let raw_kind = unpacker.pull::<4>(self.bytes, &mut self.pos);
        let Some(kind) = ScopeKind::from_u32(raw_kind) else {
            unreachable!("record stream corrupt: unknown scope kind {raw_kind}")
        };
        let keep = unpacker.pull_bool(self.bytes, &mut self.pos);
        let more_cleanups_ok = unpacker.pull_bool(self.bytes, &mut self.pos);
        let have_cleanups = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let this_entity = self.read_tree()?;
        let (names, names_size) = self.in_chain()?;
        let (namespaces, _) = self.in_chain()?;
        let static_decls = self.read_tree_vec()?;
        let (usings, _) = self.in_chain()?;
        let (using_directives, _) = self.in_chain()?;
        let shadow_count = self.in_uleb();
        let mut class_shadowed = Vec::with_capacity(shadow_count as usize);
        for index in 0..shadow_count as u32 {
            class_shadowed.push(self.read_class_binding(id, index)?);
        }
        let type_shadowed = self.read_tree()?;
        let label_count = self.in_uleb();
        let mut shadowed_labels = Vec::with_capacity(label_count as usize);
        for index in 0..label_count as u32 {
            shadowed_labels.push(self.read_label_binding(id, index)?);
        }
        let (blocks, _) = self.in_chain()?;
        let dead_vars_from_for = self.read_tree_vec()?;
        let statement_list = self.read_tree()?;
        let binding_depth = self.in_uleb() as u32;
        let level_chain = self.read_scope()?;
        *self.arena.scope_mut(id) = Scope {
            names,
            names_size,
            namespaces,
            static_decls,
            usings,
            using_directives,
            class_shadowed,
            type_shadowed,
            shadowed_labels,
            blocks,
            this_entity,
            level_chain,
            dead_vars_from_for,
            statement_list,
            binding_depth,
            kind,
            keep,
            more_cleanups_ok,
            have_cleanups,
        };
        Ok(id)
    }

    /// Reads a binding reference or record, recursing into the stack it
    /// shadows.
    fn read_binding(&mut self) -> Result<Option<BindingId>> {
        let marker = self.in_marker();
        match marker {
            RecordMarker::End => {
                self.tracer.marker(marker, None);
                Ok(None)
            }
            RecordMarker::InternalRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.cache.handle_at(slot).expect_binding()))
            }
            RecordMarker::ExternalRef => {
                let image = self.in_slot();
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                let cache = self.read_set.image(image).cache();
                Ok(Some(cache.handle_at(slot).expect_binding()))
            }
            RecordMarker::PreloadedRef => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                Ok(Some(self.preloaded.handle_at(slot).expect_binding()))
            }
            RecordMarker::Start => {
                let slot = self.in_slot();
                self.tracer.marker(marker, Some(slot));
                self.read_binding_record(slot).map(Some)
            }
        }
    }

    fn read_binding_record(&mut self, slot: u32) -> Result<BindingId> {
        let id = self.arena.push_binding(Binding::default());
        self.cache.insert_at(Handle::Binding(id), slot);
        let mut unpacker = BitUnpacker::new();
        let value_is_inherited = unpacker.pull_bool(self.bytes, &mut self.pos);
        let is_local = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let value = self.read_tree()?;
        let ttype = self.read_tree()?;
        let scope = self.read_scope()?;
        let previous = self.read_binding()?;
        *self.arena.binding_mut(id) = Binding {
            value,
            ttype,
            scope,
            previous,
            value_is_inherited,
            is_local,
        };
        Ok(id)
    }

    fn read_class_binding(&mut self, owner: ScopeId, index: u32) -> Result<ClassBinding> {
        let slot = self.in_required_start("a class-scope shadowed binding");
        self.cache.insert_at(Handle::ClassBinding(owner, index), slot);
        let identifier = self.read_tree()?;
        let base = self.read_binding()?;
        Ok(ClassBinding { base, identifier })
    }

    fn read_label_binding(&mut self, owner: ScopeId, index: u32) -> Result<LabelBinding> {
        let slot = self.in_required_start("a label-scope shadowed binding");
        self.cache.insert_at(Handle::LabelBinding(owner, index), slot);
        let label = self.read_tree()?;
        let prev_value = self.read_tree()?;
        Ok(LabelBinding { label, prev_value })
    }

    // --- LANGUAGE-SPECIFIC EXTENSIONS ---

    fn read_lang_decl(&mut self, owner: NodeId) -> Result<Option<LangDecl>> {
        let Some(slot) = self.in_owned_start("a declaration extension") else {
            return Ok(None);
        };
        self.cache.insert_at(Handle::LangDecl(owner), slot);
        let mut unpacker = BitUnpacker::new();
        let selector = unpacker.pull::<16>(self.bytes, &mut self.pos);
        let raw_language = unpacker.pull::<4>(self.bytes, &mut self.pos);
        let Some(language) = Language::from_u32(raw_language) else {
            unreachable!("record stream corrupt: unknown declaration language {raw_language}")
        };
        let use_template = unpacker.pull::<2>(self.bytes, &mut self.pos) as u8;
        let not_really_extern = unpacker.pull_bool(self.bytes, &mut self.pos);
        let initialized_in_class = unpacker.pull_bool(self.bytes, &mut self.pos);
        let repo_available = unpacker.pull_bool(self.bytes, &mut self.pos);
        let threadprivate_or_deleted = unpacker.pull_bool(self.bytes, &mut self.pos);
        let anticipated = unpacker.pull_bool(self.bytes, &mut self.pos);
        let friend_or_tls = unpacker.pull_bool(self.bytes, &mut self.pos);
        let template_conv = unpacker.pull_bool(self.bytes, &mut self.pos);
        let odr_used = unpacker.pull_bool(self.bytes, &mut self.pos);
        let discriminator = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let payload = match selector {
            0 => LangDeclPayload::Min(self.read_lang_decl_min(discriminator)?),
            1 => {
                let min = self.read_lang_decl_min(discriminator)?;
                LangDeclPayload::Fn(Box::new(self.read_lang_decl_fn(owner, min)?))
            }
            2 => LangDeclPayload::Ns(LangDeclNs {
                level: self.read_scope()?,
            }),
            3 => {
                let level = self.in_uleb() as u32;
                let index = self.in_uleb() as u32;
                LangDeclPayload::Parm(LangDeclParm { level, index })
            }
            other => {
                unreachable!("record stream corrupt: unknown declaration extension selector {other}")
            }
        };
        Ok(Some(LangDecl {
            language,
            use_template,
            not_really_extern,
            initialized_in_class,
            repo_available,
            threadprivate_or_deleted,
            anticipated,
            friend_or_tls,
            template_conv,
            odr_used,
            payload,
        }))
    }

    fn read_lang_decl_min(&mut self, discriminator: bool) -> Result<LangDeclMin> {
        let template_info = self.read_tree()?;
        let secondary = if discriminator {
            MinSecondary::Discriminator(self.in_uleb() as u32)
        } else {
            MinSecondary::Access(self.read_tree()?)
        };
        Ok(LangDeclMin {
            template_info,
            secondary,
        })
    }

    fn read_lang_decl_fn(&mut self, owner: NodeId, min: LangDeclMin) -> Result<LangDeclFn> {
        let mut unpacker = BitUnpacker::new();
        let operator_code = unpacker.pull::<16>(self.bytes, &mut self.pos) as u16;
        let global_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let global_dtor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let constructor_attr = unpacker.pull_bool(self.bytes, &mut self.pos);
        let destructor_attr = unpacker.pull_bool(self.bytes, &mut self.pos);
        let assignment_operator = unpacker.pull_bool(self.bytes, &mut self.pos);
        let static_function = unpacker.pull_bool(self.bytes, &mut self.pos);
        let pure_virtual = unpacker.pull_bool(self.bytes, &mut self.pos);
        let defaulted = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_in_charge_parm = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_vtt_parm = unpacker.pull_bool(self.bytes, &mut self.pos);
        let nonconverting = unpacker.pull_bool(self.bytes, &mut self.pos);
        let this_thunk = unpacker.pull_bool(self.bytes, &mut self.pos);
        let hidden_friend = unpacker.pull_bool(self.bytes, &mut self.pos);
        let thunk_is_offset = unpacker.pull_bool(self.bytes, &mut self.pos);
        let pending_is_tokens = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let befriending_classes = self.read_tree()?;
        let context = self.read_tree()?;
        let thunk = if thunk_is_offset {
            ThunkDetail::FixedOffset(self.in_sleb())
        } else {
            ThunkDetail::Cloned(self.read_tree()?)
        };
        let pending = if pending_is_tokens {
            PendingBody::Tokens(self.read_token_cache()?)
        } else {
            PendingBody::Saved(self.read_function(owner)?.map(Box::new))
        };
        Ok(LangDeclFn {
            min,
            operator_code,
            global_ctor,
            global_dtor,
            constructor_attr,
            destructor_attr,
            assignment_operator,
            static_function,
            pure_virtual,
            defaulted,
            has_in_charge_parm,
            has_vtt_parm,
            nonconverting,
            this_thunk,
            hidden_friend,
            befriending_classes,
            context,
            thunk,
            pending,
        })
    }

    /// Reads the saved parsing state of a function declaration.
    fn read_function(&mut self, owner: NodeId) -> Result<Option<Function>> {
        let Some(slot) = self.in_owned_start("saved function state") else {
            return Ok(None);
        };
        self.cache.insert_at(Handle::Function(owner), slot);
        let mut unpacker = BitUnpacker::new();
        let stmts_are_full_exprs = unpacker.pull_bool(self.bytes, &mut self.pos);
        let returns_value = unpacker.pull_bool(self.bytes, &mut self.pos);
        let returns_null = unpacker.pull_bool(self.bytes, &mut self.pos);
        let returns_abnormally = unpacker.pull_bool(self.bytes, &mut self.pos);
        let in_function_try_handler = unpacker.pull_bool(self.bytes, &mut self.pos);
        let in_base_initializer = unpacker.pull_bool(self.bytes, &mut self.pos);
        let can_throw = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let statements = self.read_tree_vec()?;
        let cdtor_label = self.read_tree()?;
        let current_class_ptr = self.read_tree()?;
        let current_class_ref = self.read_tree()?;
        let eh_spec_block = self.read_tree()?;
        let in_charge_parm = self.read_tree()?;
        let vtt_parm = self.read_tree()?;
        let return_value = self.read_tree()?;
        let bindings = self.read_scope()?;
        let local_names = self.read_tree_vec()?;
        Ok(Some(Function {
            statements,
            stmts_are_full_exprs,
            cdtor_label,
            current_class_ptr,
            current_class_ref,
            eh_spec_block,
            in_charge_parm,
            vtt_parm,
            return_value,
            returns_value,
            returns_null,
            returns_abnormally,
            in_function_try_handler,
            in_base_initializer,
            can_throw,
            bindings,
            local_names,
        }))
    }

    fn read_lang_type(&mut self, owner: NodeId) -> Result<Option<LangType>> {
        let Some(slot) = self.in_owned_start("a type extension") else {
            return Ok(None);
        };
        self.cache.insert_at(Handle::LangType(owner), slot);
        let mut unpacker = BitUnpacker::new();
        let has_type_conversion = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_init_ref = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_default_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let const_init_ref = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_new = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_array_new = unpacker.pull_bool(self.bytes, &mut self.pos);
        let is_class = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let payload = if is_class {
            LangTypePayload::Class(self.read_class_type(owner)?)
        } else {
            LangTypePayload::Ptrmem(LangTypePtrmem {
                record: self.read_tree()?,
            })
        };
        Ok(Some(LangType {
            has_type_conversion,
            has_init_ref,
            has_default_ctor,
            const_init_ref,
            has_new,
            has_array_new,
            payload,
        }))
    }

    fn read_class_type(&mut self, owner: NodeId) -> Result<Box<LangTypeClass>> {
        let align = self.in_uleb() as u8;
        let mut unpacker = BitUnpacker::new();
        let has_mutable = unpacker.pull_bool(self.bytes, &mut self.pos);
        let com_interface = unpacker.pull_bool(self.bytes, &mut self.pos);
        let non_pod_class = unpacker.pull_bool(self.bytes, &mut self.pos);
        let nearly_empty = unpacker.pull_bool(self.bytes, &mut self.pos);
        let user_align = unpacker.pull_bool(self.bytes, &mut self.pos);
        let declared_class = unpacker.pull_bool(self.bytes, &mut self.pos);
        let repeated_base = unpacker.pull_bool(self.bytes, &mut self.pos);
        let diamond_shaped = unpacker.pull_bool(self.bytes, &mut self.pos);
        let being_defined = unpacker.pull_bool(self.bytes, &mut self.pos);
        let debug_requested = unpacker.pull_bool(self.bytes, &mut self.pos);
        let fields_readonly = unpacker.pull_bool(self.bytes, &mut self.pos);
        let use_template = unpacker.pull::<2>(self.bytes, &mut self.pos) as u8;
        let ptrmemfunc_flag = unpacker.pull_bool(self.bytes, &mut self.pos);
        let was_anonymous = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_default_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_copy_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_copy_assign = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_destructor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_move_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let lazy_move_assign = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_complex_copy_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_complex_copy_assign = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_complex_move_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_complex_move_assign = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_complex_dflt = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_list_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let has_constexpr_ctor = unpacker.pull_bool(self.bytes, &mut self.pos);
        let non_aggregate = unpacker.pull_bool(self.bytes, &mut self.pos);
        let non_std_layout = unpacker.pull_bool(self.bytes, &mut self.pos);
        let is_literal = unpacker.pull_bool(self.bytes, &mut self.pos);
        self.tracer.bitpack(unpacker.words_fetched());
        let primary_base = self.read_tree()?;
        let vcall_indices = self.read_pairs()?;
        let vtables = self.read_tree()?;
        let typeinfo_var = self.read_tree()?;
        let vbases = self.read_tree_vec()?;
        let nested_udts = self.read_pairs()?;
        let as_base = self.read_tree()?;
        let pure_virtuals = self.read_tree_vec()?;
        let friend_classes = self.read_tree()?;
        let methods = self.read_tree_vec()?;
        let key_method = self.read_tree()?;
        let decl_list = self.read_tree()?;
        let template_info = self.read_tree()?;
        let befriending_classes = self.read_tree()?;
        let sorted_fields = self.read_sorted_fields(owner)?;
        let lambda_expr = self.read_tree()?;
        Ok(Box::new(LangTypeClass {
            align,
            has_mutable,
            com_interface,
            non_pod_class,
            nearly_empty,
            user_align,
            declared_class,
            repeated_base,
            diamond_shaped,
            being_defined,
            debug_requested,
            fields_readonly,
            use_template,
            ptrmemfunc_flag,
            was_anonymous,
            lazy_default_ctor,
            lazy_copy_ctor,
            lazy_copy_assign,
            lazy_destructor,
            lazy_move_ctor,
            lazy_move_assign,
            has_complex_copy_ctor,
            has_complex_copy_assign,
            has_complex_move_ctor,
            has_complex_move_assign,
            has_complex_dflt,
            has_list_ctor,
            has_constexpr_ctor,
            non_aggregate,
            non_std_layout,
            is_literal,
            primary_base,
            vcall_indices,
            vtables,
            typeinfo_var,
            vbases,
            nested_udts,
            as_base,
            pure_virtuals,
            friend_classes,
            methods,
            key_method,
            decl_list,
            template_info,
            befriending_classes,
            sorted_fields,
            lambda_expr,
        }))
    }

    fn read_sorted_fields(&mut self, owner: NodeId) -> Result<Option<Vec<NodeId>>> {
        let Some(slot) = self.in_owned_start("a sorted field cache") else {
            return Ok(None);
        };
        self.cache.insert_at(Handle::SortedFields(owner), slot);
        self.read_tree_vec().map(Some)
    }
}
