//! Direct `eval` and dynamic `import()` handling.
//!
//! A direct `eval` call defeats static escape analysis: the evaluated code
//! can reference any binding visible at the call site. Every statically
//! visible binding therefore becomes a mandatory capture, and the code
//! argument is wrapped in a call to the runtime `preval` helper carrying the
//! full binding list, the ambient strictness and the enclosing function's
//! argument names, so dynamically loaded code can still be instrumented.
//!
//! The callee itself is left untouched: the call must stay syntactically
//! direct for the evaluated code to keep its scope access.

use crate::{
    ast::{build, CallExpr},
    block::BindingKind,
    ident::InternalName,
    trace::{InstrumentTracer, TraceEvent},
};

use super::{Instrumentor, Result};

impl<T: InstrumentTracer> Instrumentor<'_, T> {
    pub(crate) fn visit_direct_eval(&mut self, call: &mut CallExpr) -> Result<()> {
        self.idents.note_user_name("eval");
        self.eval_used = true;
        self.mark_fn_flag_chain(true);
        self.tracer.on_event(TraceEvent::EvalEscalation {
            fn_id: self.cur_record(),
        });

        // The user's arguments are ordinary code; record their references
        // before wrapping.
        self.visit_call_arguments(call)?;

        // Every binding visible here is reachable from the evaluated code.
        let chain = self.blocks.ancestor_chain(self.cur_block());
        let mut entries = Vec::new();
        for &block_id in chain.iter().rev() {
            let (bindings, block_name) = {
                let block = self.blocks.get(block_id);
                let bindings: Vec<(String, crate::block::Binding)> = block
                    .bindings
                    .iter()
                    .filter(|(_, binding)| binding.kind != BindingKind::Synthetic)
                    .map(|(name, binding)| (name.clone(), *binding))
                    .collect();
                (bindings, block.name.clone())
            };
            if bindings.is_empty() {
                continue;
            }
            let slot = self.blocks.ensure_scope_id(block_id);
            for (name, binding) in bindings {
                self.record_capture_chain(
                    block_id,
                    &name,
                    true,
                    !binding.is_const(),
                    binding.is_function_name(),
                    false,
                );
                entries.push((
                    name,
                    block_id,
                    slot.clone(),
                    block_name.clone(),
                    binding.is_const(),
                    binding.is_silent_const(),
                ));
            }
        }

        let arg_names_expr = match self
            .fn_stack
            .iter()
            .rposition(|ctx| !ctx.is_arrow && !ctx.is_class_shell)
        {
            Some(index) => {
                let record = self.functions.get(self.fn_stack[index].record);
                build::array_expr(record.arg_names.iter().map(|name| build::str_lit(name.as_str())).collect())
            }
            None => build::null_lit(),
        };

        let bindings_expr = build::array_expr(
            entries
                .into_iter()
                .map(|(name, block_id, slot, block_name, is_const, is_silent)| {
                    build::array_expr(vec![
                        build::str_lit(name),
                        build::num_lit(block_id.raw()),
                        build::internal_ident_expr(slot),
                        block_name.map_or_else(build::null_lit, build::str_lit),
                        build::bool_lit(is_const),
                        build::bool_lit(is_silent),
                    ])
                })
                .collect(),
        );

        let code_arg = build::take_expr(&mut call.arguments[0]);
        call.arguments[0] = build::call(
            build::internal_ident_expr(InternalName::Preval),
            vec![code_arg, bindings_expr, build::bool_lit(self.strict), arg_names_expr],
        );
        Ok(())
    }

    pub(crate) fn visit_dynamic_import(&mut self) {
        self.import_used = true;
        self.mark_fn_flag_chain(false);
    }
}
