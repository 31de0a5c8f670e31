//! Report-to-span-tree projection
//!
//! One span per node, parented along the report's nesting:
//!
//! ```text
//! inspec-run
//! └── profile: <name>
//!     └── control: <id>
//!         └── result: <code_desc>
//! ```
//!
//! Control and result spans repeat their ancestors' identity attributes so a
//! single span can be filtered on without walking up the tree.

use std::time::Duration;

use opentelemetry::trace::{TraceContextExt, Tracer};
use opentelemetry::Context;
use tracing::{debug, warn};

use crate::models::{Control, Profile, ScanReport, ScanResult, SpanAttributes};

use super::host::{joined_ip_addresses, HostProbe};
use super::pause::Pause;

/// Name of the span covering the whole run
pub const ROOT_SPAN_NAME: &str = "inspec-run";

/// `profile: <name>`
pub fn profile_span_name(profile: &Profile) -> String {
    format!("profile: {}", profile.name.as_deref().unwrap_or_default())
}

/// `control: <id>`
pub fn control_span_name(control: &Control) -> String {
    format!("control: {}", control.id.as_deref().unwrap_or_default())
}

/// `result: <code_desc>`
pub fn result_span_name(result: &ScanResult) -> String {
    format!("result: {}", result.code_desc.as_deref().unwrap_or_default())
}

/// Identity and host attributes for the root span
pub fn root_attributes(
    report: &ScanReport,
    service_name: &str,
    host: &dyn HostProbe,
) -> SpanAttributes {
    let platform = report.platform.as_ref();
    let mut attrs = SpanAttributes::new();
    attrs
        .set("service.name", service_name)
        .set_opt("platform.name", platform.and_then(|p| p.name.as_deref()))
        .set_json("platform.release", platform.and_then(|p| p.release.as_ref()))
        .set_opt("version", report.version.as_deref())
        .set_opt("hostname", host.hostname())
        .set("arch", host.arch())
        .set("os", host.os())
        .set_opt("ip_addresses", joined_ip_addresses(host));
    attrs
}

fn set_profile_identity(attrs: &mut SpanAttributes, profile: &Profile) {
    attrs
        .set_opt("profile.name", profile.name.as_deref())
        .set_opt("profile.title", profile.title.as_deref())
        .set_json("profile.version", profile.version.as_ref());
}

fn set_control_identity(attrs: &mut SpanAttributes, control: &Control) {
    attrs
        .set_opt("control.name", control.name.as_deref())
        .set_opt("control.id", control.id.as_deref());
}

/// Attributes for a profile span
///
/// `profile.attributes` carries the free-form attribute value as JSON text.
pub fn profile_attributes(profile: &Profile) -> SpanAttributes {
    let mut attrs = SpanAttributes::new();
    set_profile_identity(&mut attrs, profile);

    if let Some(raw) = &profile.attributes {
        match serde_json::to_string(raw) {
            Ok(encoded) => {
                attrs.set("profile.attributes", encoded);
            }
            Err(e) => warn!(
                profile = profile.name.as_deref().unwrap_or_default(),
                "Skipping profile.attributes, encoding failed: {}", e
            ),
        }
    }
    attrs
}

/// Attributes for a control span
pub fn control_attributes(control: &Control, profile: &Profile) -> SpanAttributes {
    let mut attrs = SpanAttributes::new();
    set_control_identity(&mut attrs, control);
    attrs
        .set_json("control.desc", control.desc.as_ref())
        .set_opt("control.impact", control.impact);
    set_profile_identity(&mut attrs, profile);
    attrs
}

/// Attributes for a result span
pub fn result_attributes(result: &ScanResult, control: &Control, profile: &Profile) -> SpanAttributes {
    let mut attrs = SpanAttributes::new();
    attrs
        .set_opt("result.status", result.status.as_ref().map(|s| s.as_str()))
        .set_opt("result.code_desc", result.code_desc.as_deref())
        .set_opt("result.run_time", result.run_time);
    set_control_identity(&mut attrs, control);
    set_profile_identity(&mut attrs, profile);
    attrs
}

/// An open span that ends when dropped
///
/// Ending on drop covers early returns and unwinding out of a child traversal.
pub struct SpanScope {
    cx: Context,
}

impl SpanScope {
    /// Context to parent child spans on
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Attach attributes to the open span
    pub fn set_attributes(&self, attrs: SpanAttributes) {
        let span = self.cx.span();
        for kv in attrs.into_key_values() {
            span.set_attribute(kv);
        }
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// Walks a report and emits its span tree, strictly in document order
pub struct SpanTreeBuilder<'a, T> {
    tracer: &'a T,
    pause: &'a dyn Pause,
    control_delay: Duration,
    opened: usize,
}

impl<'a, T> SpanTreeBuilder<'a, T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// Create a builder pausing `control_delay` after each control span opens
    pub fn new(tracer: &'a T, pause: &'a dyn Pause, control_delay: Duration) -> Self {
        Self {
            tracer,
            pause,
            control_delay,
            opened: 0,
        }
    }

    /// Number of spans opened so far
    pub fn opened(&self) -> usize {
        self.opened
    }

    /// Open a span named `name` under `parent` with `attrs` already attached
    pub fn open(&mut self, name: String, parent: &Context, attrs: SpanAttributes) -> SpanScope {
        let span = self
            .tracer
            .span_builder(name)
            .with_attributes(attrs.into_key_values())
            .start_with_context(self.tracer, parent);
        self.opened += 1;
        SpanScope {
            cx: parent.with_span(span),
        }
    }

    /// Open the root span; it has no parent
    pub fn open_root(
        &mut self,
        report: &ScanReport,
        service_name: &str,
        host: &dyn HostProbe,
    ) -> SpanScope {
        let attrs = root_attributes(report, service_name, host);
        self.open(ROOT_SPAN_NAME.to_string(), &Context::new(), attrs)
    }

    /// Emit every profile under `root`
    pub fn build_profiles(&mut self, root: &Context, profiles: &[Profile]) {
        for profile in profiles {
            self.build_profile(root, profile);
        }
    }

    fn build_profile(&mut self, parent: &Context, profile: &Profile) {
        let scope = self.open(profile_span_name(profile), parent, profile_attributes(profile));
        debug!(
            profile = profile.name.as_deref().unwrap_or_default(),
            controls = profile.controls.len(),
            "Profile span opened"
        );

        for control in &profile.controls {
            self.build_control(scope.context(), control, profile);
        }
    }

    fn build_control(&mut self, parent: &Context, control: &Control, profile: &Profile) {
        let scope = self.open(
            control_span_name(control),
            parent,
            control_attributes(control, profile),
        );

        if !self.control_delay.is_zero() {
            debug!(
                control = control.id.as_deref().unwrap_or_default(),
                "Pausing {} before control results",
                humantime::format_duration(self.control_delay)
            );
        }
        self.pause.pause(self.control_delay);

        for result in &control.results {
            self.build_result(scope.context(), result, control, profile);
        }
    }

    fn build_result(
        &mut self,
        parent: &Context,
        result: &ScanResult,
        control: &Control,
        profile: &Profile,
    ) {
        let _scope = self.open(
            result_span_name(result),
            parent,
            result_attributes(result, control, profile),
        );
    }
}
