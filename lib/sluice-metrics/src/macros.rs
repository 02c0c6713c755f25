/// Declares a struct holding a fixed set of pre-registered counters.
///
/// Every counter is registered once, when the struct is constructed, under the name `<prefix>_<counter name>` and with
/// one label per constructor argument. Accessors named after each counter hand back the registered handle, so call
/// sites never repeat names or labels.
///
/// ## Example
///
/// ```rust
/// # use sluice_metrics::static_counters;
/// static_counters!(
///    name => SpoolTelemetry,
///    prefix => spool,
///    labels => [spool_name: String],
///    counters => [records_written_total, records_dropped_total],
/// );
///
/// let telemetry = SpoolTelemetry::new("primary".to_string());
/// telemetry.records_written_total().increment(1);
/// ```
#[macro_export]
macro_rules! static_counters {
    (name => $name:ident, prefix => $prefix:ident, labels => [$($label_key:ident: $label_ty:ty),* $(,)?], counters => [$($counter:ident),+ $(,)?] $(,)?) => {
        #[derive(Clone)]
        struct $name {
            $($counter: ::metrics::Counter,)+
        }

        impl $name {
            #[allow(dead_code)]
            pub fn new($($label_key: $label_ty),*) -> Self
            where
                Self: Sized,
            $($label_ty: $crate::Stringable,)*
            {
                #[allow(unused_imports)]
                use $crate::Stringable as _;

                let labels: ::std::vec::Vec<::metrics::Label> = ::std::vec![
                    $(::metrics::Label::new(stringify!($label_key), $label_key.to_shared_string()),)*
                ];

                Self {
                    $($counter: ::metrics::counter!(concat!(stringify!($prefix), "_", stringify!($counter)), labels.iter()),)+
                }
            }

            $(
                #[allow(dead_code)]
                pub fn $counter(&self) -> &::metrics::Counter {
                    &self.$counter
                }
            )+
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(stringify!($name))
            }
        }
    };
}
