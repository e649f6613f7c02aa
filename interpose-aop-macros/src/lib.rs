//! Interpose AOP 过程宏
//!
//! - `#[methods]` - 为 `impl` 块生成方法表，使类型可以被 `Proxy` 按名称调用

extern crate proc_macro;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl};

mod methods;

/// `#[methods]` 属性宏
///
/// 为 `impl` 块中所有 `pub fn xxx(&self, ...)` 生成 `Proxied` 实现。
///
/// 使用示例：
/// ```ignore
/// use interpose_aop::methods;
///
/// struct TestStruct;
///
/// #[methods]
/// impl TestStruct {
///     #[interpose(name = "Concat")]
///     pub fn concat(&self, a: &str, b: &str) -> (String, usize) {
///         let ret = format!("{}{}", a, b);
///         let len = ret.len();
///         (ret, len)
///     }
///
///     #[interpose(skip)]
///     pub fn internal(&self) {}
/// }
/// ```
///
/// 参数可以是 `T: Clone`（从参数中克隆）、`&T`（直接借用）或 `&str`（借用存储的 `String` 或 `&'static str`）。
/// 返回值：无返回或 `()` 对应 0 个结果，n 元组对应 n 个结果，其他类型对应 1 个结果。
#[proc_macro_attribute]
pub fn methods(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[methods] does not take arguments",
        )
        .to_compile_error()
        .into();
    }

    let item = parse_macro_input!(item as ItemImpl);
    methods::impl_methods(item)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
