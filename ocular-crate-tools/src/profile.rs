//! tracy 性能分析
//!
//! `tracy_client::span!` 在 client 没有启动时会 panic，单元测试和 headless 运行不会启动 client，
//! 因此统一使用 [`profile_span!`]：client 没有运行时不创建 span

#[doc(hidden)]
pub use tracy_client as __tracy;

/// 在当前作用域内创建一个 tracy span
///
/// ```ignore
/// let _span = ocular_crate_tools::profile_span!("Renderer::tick");
/// ```
#[macro_export]
macro_rules! profile_span {
    ($name:literal) => {
        $crate::profile::__tracy::Client::running()
            .map(|client| client.span($crate::profile::__tracy::span_location!($name), 0))
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_span_without_client() {
        let span = crate::profile_span!("test");
        assert!(span.is_none());
    }
}
