//! Expression visitors: reference classification and capture recording.
//!
//! The identifier visitor is the hot path: it notes every user name with the
//! identifier table, resolves the binding, records captures along the
//! function chain and detects const violations. `this` and `arguments` are
//! implicit bindings of the nearest non-arrow function; they only matter
//! when referenced from inside an arrow.

use crate::{
    ast::{build, BindingHint, CallExpr, Expr, Ident, Pat},
    error::CodeLoc,
    function::AmendmentKind,
    ident::InternalName,
    resolve::{resolve, BindingClass},
    trace::InstrumentTracer,
    trail::rebase,
};

use super::{Instrumentor, Result};

impl<T: InstrumentTracer> Instrumentor<'_, T> {
    pub(crate) fn visit_expr(&mut self, expr: &mut Expr) -> Result<()> {
        self.enter_depth(expr.start_loc())?;
        let result = self.visit_expr_inner(expr);
        self.leave_depth();
        result
    }

    fn visit_expr_inner(&mut self, expr: &mut Expr) -> Result<()> {
        match expr {
            Expr::Ident(_) => return self.visit_ident_ref(expr),
            Expr::Lit(_) => {}
            Expr::Template(template) => {
                self.push_key("expressions");
                for (index, inner) in template.expressions.iter_mut().enumerate() {
                    self.push_index(index);
                    self.visit_expr(inner)?;
                    self.pop_trail(1);
                }
                self.pop_trail(1);
            }
            Expr::TaggedTemplate(tagged) => {
                self.push_key("tag");
                self.visit_expr(&mut tagged.tag)?;
                self.pop_trail(1);
                self.push_key("quasi");
                self.push_key("expressions");
                for (index, inner) in tagged.quasi.expressions.iter_mut().enumerate() {
                    self.push_index(index);
                    self.visit_expr(inner)?;
                    self.pop_trail(1);
                }
                self.pop_trail(2);
            }
            Expr::This(this_expr) => {
                let loc = this_expr.base.start_loc();
                self.visit_this(loc);
            }
            Expr::SuperRef(super_node) => {
                // `super` is only valid as a callee or member object; both
                // are intercepted before descending here.
                return Err(self.unexpected_node("Super", super_node.base.start_loc()));
            }
            Expr::Array(array) => {
                self.push_key("elements");
                for (index, element) in array.elements.iter_mut().enumerate() {
                    if let Some(element) = element {
                        self.push_index(index);
                        self.visit_expr(element)?;
                        self.pop_trail(1);
                    }
                }
                self.pop_trail(1);
            }
            Expr::Object(_) => return self.visit_object_expr(expr),
            Expr::Fn(func) => return self.visit_fn_expression(func),
            Expr::Class(_) => {
                let Expr::Class(class) = expr else { unreachable!() };
                let wrap = self.visit_class_node(class, None)?;
                if let Some(temp) = wrap {
                    self.wrap_class_expr(expr, temp, None);
                }
            }
            Expr::Unary(unary) => {
                self.push_key("argument");
                self.visit_expr(&mut unary.argument)?;
                self.pop_trail(1);
            }
            Expr::Update(update) => {
                self.push_key("argument");
                if matches!(update.argument, Expr::Ident(_)) {
                    self.visit_ident_slot(&mut update.argument, true, true)?;
                } else {
                    self.visit_expr(&mut update.argument)?;
                }
                self.pop_trail(1);
            }
            Expr::Binary(binary) => {
                self.push_key("left");
                self.visit_expr(&mut binary.left)?;
                self.pop_trail(1);
                self.push_key("right");
                self.visit_expr(&mut binary.right)?;
                self.pop_trail(1);
            }
            Expr::Logical(logical) => {
                self.push_key("left");
                self.visit_expr(&mut logical.left)?;
                self.pop_trail(1);
                self.push_key("right");
                self.visit_expr(&mut logical.right)?;
                self.pop_trail(1);
            }
            Expr::Assign(assign) => {
                let compound = !assign.is_plain_assign();
                self.push_key("left");
                self.visit_pat_assign(&mut assign.left, compound)?;
                self.pop_trail(1);
                self.push_key("right");
                // An anonymous class on the right of a plain assignment to
                // an identifier infers that identifier as its name; keep the
                // context so a super-target wrap can preserve it.
                let target_name = if assign.is_plain_assign() {
                    assign.left.as_ident().map(|ident| ident.name.clone())
                } else {
                    None
                };
                if let (Expr::Class(class), Some(name)) = (&mut assign.right, &target_name) {
                    let wrap = self.visit_class_node(class, Some((name.as_str(), false)))?;
                    if let Some(temp) = wrap {
                        let inferred = target_name.clone();
                        self.wrap_class_expr(&mut assign.right, temp, inferred.as_deref());
                    }
                } else {
                    self.visit_expr(&mut assign.right)?;
                }
                self.pop_trail(1);
            }
            Expr::Cond(cond) => {
                self.push_key("test");
                self.visit_expr(&mut cond.test)?;
                self.pop_trail(1);
                self.push_key("consequent");
                self.visit_expr(&mut cond.consequent)?;
                self.pop_trail(1);
                self.push_key("alternate");
                self.visit_expr(&mut cond.alternate)?;
                self.pop_trail(1);
            }
            Expr::Call(_) => return self.visit_call_expr(expr),
            Expr::New(new) => {
                self.push_key("callee");
                self.visit_expr(&mut new.callee)?;
                self.pop_trail(1);
                self.push_key("arguments");
                for (index, argument) in new.arguments.iter_mut().enumerate() {
                    self.push_index(index);
                    self.visit_expr(argument)?;
                    self.pop_trail(1);
                }
                self.pop_trail(1);
            }
            Expr::Seq(seq) => {
                self.push_key("expressions");
                for (index, inner) in seq.expressions.iter_mut().enumerate() {
                    self.push_index(index);
                    self.visit_expr(inner)?;
                    self.pop_trail(1);
                }
                self.pop_trail(1);
            }
            Expr::Member(member) => {
                if matches!(member.object, Expr::SuperRef(_)) {
                    self.visit_super_expression(member)?;
                } else {
                    self.push_key("object");
                    self.visit_expr(&mut member.object)?;
                    self.pop_trail(1);
                }
                if member.computed {
                    self.push_key("property");
                    self.visit_expr(&mut member.property)?;
                    self.pop_trail(1);
                }
                // Non-computed property names are not reference positions.
            }
            Expr::Yield(yield_expr) => {
                if let Some(argument) = &mut yield_expr.argument {
                    self.push_key("argument");
                    self.visit_expr(argument)?;
                    self.pop_trail(1);
                }
            }
            Expr::Await(await_expr) => {
                self.push_key("argument");
                self.visit_expr(&mut await_expr.argument)?;
                self.pop_trail(1);
            }
            Expr::ImportCall(import) => {
                if import.options.is_some() {
                    return Err(self.unexpected_node("ImportExpression attributes", import.base.start_loc()));
                }
                self.visit_dynamic_import();
                self.push_key("source");
                self.visit_expr(&mut import.source)?;
                self.pop_trail(1);
            }
            Expr::Meta(_) => {
                // `new.target` / `import.meta` pass through untouched.
            }
            Expr::Chain(chain) => {
                self.push_key("expression");
                self.visit_expr(&mut chain.expression)?;
                self.pop_trail(1);
            }
            Expr::Spread(spread) => {
                self.push_key("argument");
                self.visit_expr(&mut spread.argument)?;
                self.pop_trail(1);
            }
            Expr::Unknown(unknown) => {
                return Err(self.unexpected_node(&unknown.node_type.clone(), unknown.start_loc()));
            }
        }
        Ok(())
    }

    fn visit_call_expr(&mut self, expr: &mut Expr) -> Result<()> {
        let Expr::Call(call) = expr else { unreachable!() };
        if matches!(call.callee, Expr::SuperRef(_)) {
            return self.visit_super_call(call);
        }
        if self.is_direct_eval(call) {
            return self.visit_direct_eval(call);
        }
        self.push_key("callee");
        self.visit_expr(&mut call.callee)?;
        self.pop_trail(1);
        self.visit_call_arguments(call)
    }

    pub(crate) fn visit_call_arguments(&mut self, call: &mut CallExpr) -> Result<()> {
        self.push_key("arguments");
        for (index, argument) in call.arguments.iter_mut().enumerate() {
            self.push_index(index);
            self.visit_expr(argument)?;
            self.pop_trail(1);
        }
        self.pop_trail(1);
        Ok(())
    }

    fn is_direct_eval(&self, call: &CallExpr) -> bool {
        let Expr::Ident(ident) = &call.callee else { return false };
        if ident.internal.is_some() || ident.name != "eval" || call.arguments.is_empty() {
            return false;
        }
        // Direct-eval semantics require the global `eval`; a shadowing
        // binding makes this an ordinary call.
        resolve(&self.blocks, self.cur_block(), self.cur_record(), "eval").class == BindingClass::Global
    }

    // -- identifiers --------------------------------------------------------

    /// An identifier in a read position, with replacement power: a bare
    /// unshadowed `eval` reference becomes a `getEval()` call.
    fn visit_ident_ref(&mut self, slot: &mut Expr) -> Result<()> {
        let Expr::Ident(ident) = slot else { unreachable!() };
        if ident.internal.is_some() {
            return Ok(());
        }
        if ident.name == "eval"
            && resolve(&self.blocks, self.cur_block(), self.cur_record(), "eval").class == BindingClass::Global
        {
            self.idents.note_user_name("eval");
            self.eval_used = true;
            *slot = build::call(build::internal_ident_expr(InternalName::GetEval), Vec::new());
            return Ok(());
        }
        self.visit_ident_use_parts(
            &ident.name.clone(),
            ident.binding_hint,
            ident.base.start_loc(),
            true,
            false,
        )
    }

    /// An identifier occurrence in a known read/write context (no
    /// replacement).
    fn visit_ident_slot(&mut self, slot: &mut Expr, is_read: bool, is_write: bool) -> Result<()> {
        let Expr::Ident(ident) = slot else { unreachable!() };
        self.visit_ident(ident, is_read, is_write)
    }

    pub(crate) fn visit_ident(&mut self, ident: &Ident, is_read: bool, is_write: bool) -> Result<()> {
        if ident.internal.is_some() {
            return Ok(());
        }
        self.visit_ident_use_parts(
            &ident.name.clone(),
            ident.binding_hint,
            ident.base.start_loc(),
            is_read,
            is_write,
        )
    }

    fn visit_ident_use_parts(
        &mut self,
        name: &str,
        hint: Option<BindingHint>,
        loc: Option<CodeLoc>,
        is_read: bool,
        is_write: bool,
    ) -> Result<()> {
        self.idents.note_user_name(name);
        let resolution = resolve(&self.blocks, self.cur_block(), self.cur_record(), name);
        match resolution.class {
            BindingClass::Local | BindingClass::Captured => {
                let block = resolution.block.expect("resolved binding carries its block");
                if is_write && resolution.is_const() {
                    let kind = if resolution.is_silent_const() {
                        if self.strict {
                            AmendmentKind::ConstViolationFnThrowing
                        } else {
                            AmendmentKind::ConstViolationFnSilent
                        }
                    } else {
                        AmendmentKind::ConstViolationConst
                    };
                    self.record_amendment(kind, block);
                    // The write is not a dependency; a compound operator
                    // still reads.
                    if resolution.class == BindingClass::Captured && is_read {
                        self.record_capture_chain(block, name, true, false, resolution.is_function_name(), true);
                    }
                    if resolution.class == BindingClass::Local {
                        self.record_local_occurrence(name);
                    }
                    return Ok(());
                }
                match resolution.class {
                    BindingClass::Local => self.record_local_occurrence(name),
                    BindingClass::Captured => {
                        self.record_capture_chain(block, name, is_read, is_write, resolution.is_function_name(), true);
                    }
                    _ => unreachable!(),
                }
            }
            BindingClass::CommonModule => {
                if let Some(record) = self.cur_record() {
                    self.functions.get_mut(record).global_names.insert(name.to_owned());
                }
            }
            BindingClass::Global => {
                if name == "arguments" {
                    return self.visit_arguments(is_read, is_write);
                }
                // A hint claiming a binding is only satisfiable when the
                // name was seen in top-level declarator position (covers
                // declarations synthesized upstream of the resolver).
                if matches!(
                    hint,
                    Some(
                        BindingHint::Param
                            | BindingHint::Var
                            | BindingHint::Let
                            | BindingHint::Const
                            | BindingHint::Hoisted
                            | BindingHint::Local
                    )
                ) && !self.top_level_names.contains(name)
                {
                    return Err(self.err(
                        crate::error::ErrorKind::BindingUnresolvable,
                        format!("reference '{name}' is marked bound but no declaration is visible"),
                        loc,
                    ));
                }
                if let Some(record) = self.cur_record() {
                    self.functions.get_mut(record).global_names.insert(name.to_owned());
                }
            }
        }
        Ok(())
    }

    // -- implicit bindings --------------------------------------------------

    /// Index in `fn_stack` of the nearest context with its own
    /// `this`/`arguments` (skips arrows and class shells).
    fn nearest_full_fn(&self) -> Option<usize> {
        self.fn_stack
            .iter()
            .rposition(|ctx| !ctx.is_arrow && !ctx.is_class_shell)
    }

    pub(crate) fn visit_this(&mut self, _loc: Option<CodeLoc>) {
        let Some(home_index) = self.nearest_full_fn() else { return };
        let home = &self.fn_stack[home_index];
        let home_record = home.record;
        let home_param_block = home.param_block;
        let is_derived_ctor = home.is_constructor && self.functions.get(home_record).has_super_class;

        if is_derived_ctor {
            // The serializer re-routes `this` through a temporary when
            // `super()` is not the first statement; give it the sites.
            self.record_internal_var("this");
        }
        if home_index + 1 < self.fn_stack.len() {
            // Referenced from inside an arrow: the arrow captures the
            // enclosing function's `this`.
            self.blocks.declare(
                home_param_block,
                "this",
                crate::block::Binding::new(crate::block::BindingKind::Synthetic),
            );
            self.record_capture_chain(home_param_block, "this", true, false, false, true);
        }
    }

    fn visit_arguments(&mut self, is_read: bool, is_write: bool) -> Result<()> {
        let Some(home_index) = self.nearest_full_fn() else {
            // Top-level `arguments` is just a global.
            if let Some(record) = self.cur_record() {
                self.functions.get_mut(record).global_names.insert("arguments".to_owned());
            }
            return Ok(());
        };
        if home_index + 1 < self.fn_stack.len() {
            let home_param_block = self.fn_stack[home_index].param_block;
            self.blocks.declare(
                home_param_block,
                "arguments",
                crate::block::Binding::new(crate::block::BindingKind::Synthetic),
            );
            self.record_capture_chain(home_param_block, "arguments", is_read, is_write, false, true);
        }
        Ok(())
    }

    pub(crate) fn record_internal_var(&mut self, name: &str) {
        let Some(ctx) = self.recording_ctx() else { return };
        let trail = rebase(&self.trail, ctx.trail_len);
        let record = ctx.record;
        self.functions
            .get_mut(record)
            .internal_vars
            .entry(name.to_owned())
            .or_default()
            .push(trail);
    }

    pub(crate) fn record_amendment(&mut self, kind: AmendmentKind, block: crate::block::BlockId) {
        let Some(ctx) = self.recording_ctx() else { return };
        let trail = rebase(&self.trail, ctx.trail_len);
        let record = ctx.record;
        self.functions.get_mut(record).prepend_amendment(kind, block, trail);
        self.tracer.on_event(crate::trace::TraceEvent::AmendmentRecorded {
            fn_id: record,
            kind: match kind {
                AmendmentKind::ConstViolationConst => "const-violation-const",
                AmendmentKind::ConstViolationFnThrowing => "const-violation-fn-throwing",
                AmendmentKind::ConstViolationFnSilent => "const-violation-fn-silent",
                AmendmentKind::SuperCall => "super-call",
                AmendmentKind::SuperExpression => "super-expression",
            },
        });
    }

    // -- patterns -----------------------------------------------------------

    /// A pattern in declaration position: identifiers bind rather than
    /// reference, but defaults and computed keys are ordinary expressions.
    pub(crate) fn visit_pat_declare(&mut self, pat: &mut Pat) -> Result<()> {
        match pat {
            Pat::Ident(ident) => {
                if ident.internal.is_none() {
                    self.idents.note_user_name(&ident.name);
                    let name = ident.name.clone();
                    self.record_local_occurrence(&name);
                }
            }
            Pat::Assign(assign) => {
                self.push_key("left");
                self.visit_pat_declare(&mut assign.left)?;
                self.pop_trail(1);
                self.push_key("right");
                self.visit_expr(&mut assign.right)?;
                self.pop_trail(1);
            }
            Pat::Object(object) => {
                self.push_key("properties");
                for (index, prop) in object.properties.iter_mut().enumerate() {
                    self.push_index(index);
                    match prop {
                        crate::ast::ObjectPatProp::Prop(prop) => {
                            if prop.computed {
                                self.push_key("key");
                                self.visit_expr(&mut prop.key)?;
                                self.pop_trail(1);
                            }
                            self.push_key("value");
                            self.visit_pat_declare(&mut prop.value)?;
                            self.pop_trail(1);
                        }
                        crate::ast::ObjectPatProp::Rest(rest) => {
                            self.push_key("argument");
                            self.visit_pat_declare(&mut rest.argument)?;
                            self.pop_trail(1);
                        }
                    }
                    self.pop_trail(1);
                }
                self.pop_trail(1);
            }
            Pat::Array(array) => {
                self.push_key("elements");
                for (index, element) in array.elements.iter_mut().enumerate() {
                    if let Some(element) = element {
                        self.push_index(index);
                        self.visit_pat_declare(element)?;
                        self.pop_trail(1);
                    }
                }
                self.pop_trail(1);
            }
            Pat::Rest(rest) => {
                self.push_key("argument");
                self.visit_pat_declare(&mut rest.argument)?;
                self.pop_trail(1);
            }
            Pat::Expr(expr) => self.visit_expr(expr)?,
        }
        Ok(())
    }

    /// A pattern in assignment position: identifiers are written (and also
    /// read under a compound operator).
    pub(crate) fn visit_pat_assign(&mut self, pat: &mut Pat, compound_read: bool) -> Result<()> {
        match pat {
            Pat::Ident(ident) => self.visit_ident(ident, compound_read, true)?,
            Pat::Assign(assign) => {
                self.push_key("left");
                self.visit_pat_assign(&mut assign.left, false)?;
                self.pop_trail(1);
                self.push_key("right");
                self.visit_expr(&mut assign.right)?;
                self.pop_trail(1);
            }
            Pat::Object(object) => {
                self.push_key("properties");
                for (index, prop) in object.properties.iter_mut().enumerate() {
                    self.push_index(index);
                    match prop {
                        crate::ast::ObjectPatProp::Prop(prop) => {
                            if prop.computed {
                                self.push_key("key");
                                self.visit_expr(&mut prop.key)?;
                                self.pop_trail(1);
                            }
                            self.push_key("value");
                            self.visit_pat_assign(&mut prop.value, false)?;
                            self.pop_trail(1);
                        }
                        crate::ast::ObjectPatProp::Rest(rest) => {
                            self.push_key("argument");
                            self.visit_pat_assign(&mut rest.argument, false)?;
                            self.pop_trail(1);
                        }
                    }
                    self.pop_trail(1);
                }
                self.pop_trail(1);
            }
            Pat::Array(array) => {
                self.push_key("elements");
                for (index, element) in array.elements.iter_mut().enumerate() {
                    if let Some(element) = element {
                        self.push_index(index);
                        self.visit_pat_assign(element, false)?;
                        self.pop_trail(1);
                    }
                }
                self.pop_trail(1);
            }
            Pat::Rest(rest) => {
                self.push_key("argument");
                self.visit_pat_assign(&mut rest.argument, false)?;
                self.pop_trail(1);
            }
            // Member-expression target: the write hits a property, not a
            // binding; everything inside is ordinary reads.
            Pat::Expr(expr) => self.visit_expr(expr)?,
        }
        Ok(())
    }
}
