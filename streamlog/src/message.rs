//! The record types a [`Publisher`](crate::Publisher) accepts.

use serde::Serialize;

/// A record type that can be published to a stream destination.
///
/// A publisher is bound to exactly one implementor for its whole lifetime, so
/// handing it a value of any other type is rejected at compile time:
///
/// ```compile_fail
/// use serde::Serialize;
/// use streamlog::{Message, Publisher};
///
/// #[derive(Serialize)]
/// struct ClickImpression {
///     element: String,
/// }
/// impl Message for ClickImpression {}
///
/// #[derive(Serialize)]
/// struct SearchImpression {
///     query: String,
/// }
/// impl Message for SearchImpression {}
///
/// async fn log_wrong_type(publisher: &Publisher<ClickImpression>) {
///     let search = SearchImpression {
///         query: "food".to_string(),
///     };
///     let _ = publisher.log(&search).await;
/// }
/// ```
pub trait Message: Serialize + Send + Sync + 'static {
    /// The fully qualified path of the type, used to derive the destination
    /// name. Must be a module path followed by a plain type name, e.g.
    /// `my_app::events::ClickImpression`.
    ///
    /// Defaults to [`std::any::type_name`].
    fn type_path() -> &'static str {
        std::any::type_name::<Self>()
    }
}
