//! #[methods] 实现
//!
//! 把 `impl` 块原样输出（去掉 `#[interpose(...)]` 标注），
//! 再追加一个 `Proxied` 实现，把每个公开的 `&self` 方法注册进方法表。

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{
    FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, ReturnType, Type, TypeReference, Visibility,
};

/// 方法上的 `#[interpose(...)]` 选项
#[derive(Default)]
struct MethodOptions {
    name: Option<LitStr>,
    skip: bool,
}

fn parse_options(method: &ImplItemFn) -> syn::Result<MethodOptions> {
    let mut options = MethodOptions::default();
    for attr in method.attrs.iter().filter(|a| a.path().is_ident("interpose")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                options.skip = true;
                Ok(())
            } else if meta.path.is_ident("name") {
                options.name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `skip`"))
            }
        })?;
    }
    Ok(options)
}

/// 参数的取值方式
enum ParamKind<'a> {
    /// `&str`，存储为 `String` 或 `&'static str`
    Str,
    /// `&T`
    Borrowed(&'a Type),
    /// `T`，克隆出来
    Owned(&'a Type),
}

fn classify(ty: &Type) -> syn::Result<ParamKind<'_>> {
    match ty {
        Type::Reference(TypeReference {
            mutability: Some(_),
            ..
        }) => Err(syn::Error::new_spanned(
            ty,
            "#[methods] cannot pass `&mut` parameters",
        )),
        Type::Reference(TypeReference { elem, .. }) => match elem.as_ref() {
            Type::Path(path) if path.qself.is_none() && path.path.is_ident("str") => {
                Ok(ParamKind::Str)
            }
            inner => Ok(ParamKind::Borrowed(inner)),
        },
        Type::ImplTrait(_) => Err(syn::Error::new_spanned(
            ty,
            "#[methods] cannot pass `impl Trait` parameters",
        )),
        other => Ok(ParamKind::Owned(other)),
    }
}

/// 为单个方法生成 `table.insert(...)`
fn register_method(method: &ImplItemFn, name: &LitStr) -> syn::Result<TokenStream> {
    let sig = &method.sig;
    let ident = &sig.ident;

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            sig.asyncness,
            "#[methods] does not support async methods",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "#[methods] does not support generic methods",
        ));
    }

    let mut param_types = Vec::new();
    let mut bindings = Vec::new();
    let mut args = Vec::new();

    for input in sig.inputs.iter() {
        let pat_type = match input {
            FnArg::Receiver(_) => continue,
            FnArg::Typed(pat_type) => pat_type,
        };
        let index = args.len();
        let arg = format_ident!("__arg{}", index);

        let (stored, extract) = match classify(&pat_type.ty)? {
            ParamKind::Str => (
                quote!(::std::string::String),
                quote!(::interpose_aop::value::arg_str(&__params, #name, #index)?),
            ),
            ParamKind::Borrowed(ty) => (
                quote!(#ty),
                quote!(::interpose_aop::value::arg::<#ty>(&__params, #name, #index)?),
            ),
            ParamKind::Owned(ty) => (
                quote!(#ty),
                quote!(::std::clone::Clone::clone(::interpose_aop::value::arg::<#ty>(&__params, #name, #index)?)),
            ),
        };

        param_types.push(stored);
        bindings.push(quote!(let #arg = #extract;));
        args.push(arg);
    }

    let call = quote!(__target.#ident(#(#args),*));
    let (returns, body) = match &sig.output {
        ReturnType::Default => (0usize, quote!(#call; ::std::result::Result::Ok(::std::vec::Vec::new()))),
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Tuple(tuple) if tuple.elems.is_empty() => {
                (0, quote!(#call; ::std::result::Result::Ok(::std::vec::Vec::new())))
            }
            Type::Tuple(tuple) => {
                let parts: Vec<_> = (0..tuple.elems.len())
                    .map(|i| format_ident!("__ret{}", i))
                    .collect();
                (
                    parts.len(),
                    quote! {
                        let (#(#parts,)*) = #call;
                        ::std::result::Result::Ok(::std::vec![#(::interpose_aop::Value::new(#parts)),*])
                    },
                )
            }
            _ => (1, quote!(::std::result::Result::Ok(::std::vec![::interpose_aop::Value::new(#call)]))),
        },
    };

    let unused = if args.is_empty() {
        quote!(let _ = &__params;)
    } else {
        quote!()
    };

    Ok(quote! {
        __table.insert(
            ::interpose_aop::MethodSignature::new(#name)
                #(.param::<#param_types>())*
                .returns(#returns),
            |__target: &Self,
             __params: ::std::vec::Vec<::interpose_aop::Value>|
             -> ::interpose_aop::AopResult<::std::vec::Vec<::interpose_aop::Value>> {
                #unused
                #(#bindings)*
                #body
            },
        );
    })
}

/// 是否为 `&self`；`&mut self` 与 `self` 报错，关联函数返回 `false`
fn takes_shared_self(method: &ImplItemFn) -> syn::Result<bool> {
    match method.sig.receiver() {
        None => Ok(false),
        Some(receiver) if receiver.reference.is_none() => Err(syn::Error::new_spanned(
            receiver,
            "#[methods] requires `&self`; `self` by value cannot be shared by a proxy",
        )),
        Some(receiver) if receiver.mutability.is_some() => Err(syn::Error::new_spanned(
            receiver,
            "#[methods] requires `&self`; use interior mutability instead of `&mut self`",
        )),
        Some(_) => Ok(true),
    }
}

pub fn impl_methods(mut item: ItemImpl) -> syn::Result<TokenStream> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[methods] must be placed on an inherent impl block",
        ));
    }

    let mut registrations = Vec::new();
    let mut seen = HashSet::new();

    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(method) = impl_item else {
            continue;
        };

        let options = parse_options(method)?;
        method.attrs.retain(|attr| !attr.path().is_ident("interpose"));

        if options.skip || !matches!(method.vis, Visibility::Public(_)) {
            continue;
        }
        if !takes_shared_self(method)? {
            continue;
        }

        let name = options
            .name
            .unwrap_or_else(|| LitStr::new(&method.sig.ident.to_string(), method.sig.ident.span()));
        if !seen.insert(name.value()) {
            return Err(syn::Error::new(
                name.span(),
                format!("duplicate method name `{}`", name.value()),
            ));
        }

        registrations.push(register_method(method, &name)?);
    }

    if registrations.is_empty() {
        return Err(syn::Error::new(
            Span::call_site(),
            "#[methods] found no `pub fn ...(&self, ...)` methods",
        ));
    }

    let self_ty = &item.self_ty;
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();

    Ok(quote! {
        #item

        impl #impl_generics ::interpose_aop::Proxied for #self_ty #where_clause {
            fn method_table() -> ::interpose_aop::MethodTable<Self> {
                let mut __table = ::interpose_aop::MethodTable::new();
                #(#registrations)*
                __table
            }
        }
    })
}
