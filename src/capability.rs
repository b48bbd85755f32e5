/// Identity of a capability interface.
///
/// Implemented on the trait object type of each instrumented service trait,
/// e.g. `impl Capability for dyn ArticleService`. The name labels every log
/// record and every registry diagnostic for that capability.
///
/// # Examples
///
/// ```
/// use service_instrument::Capability;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self, name: &str) -> String;
/// }
///
/// impl Capability for dyn Greeter {
///     const NAME: &'static str = "Greeter";
/// }
///
/// assert_eq!(<dyn Greeter as Capability>::NAME, "Greeter");
/// ```
pub trait Capability: Send + Sync + 'static {
    /// Name used in log records and errors.
    const NAME: &'static str;
}
