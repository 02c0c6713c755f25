//! Helpers for declaring and testing `metrics`-based telemetry.
#![deny(warnings)]
#![deny(missing_docs)]

mod macros;


/// A type that can be rendered into a metric label value.
///
/// Blanket-implemented for everything that implements `Display`. Used by `static_counters!` so that label values can
/// stay strongly typed until registration time.
pub trait Stringable {
    /// Renders `self` as a shared string suitable for a label value.
    fn to_shared_string(&self) -> ::metrics::SharedString;
}

impl<T> Stringable for T
where
    T: std::fmt::Display,
{
    fn to_shared_string(&self) -> ::metrics::SharedString {
        std::string::ToString::to_string(&self).into()
    }
}
