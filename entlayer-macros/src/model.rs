use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Expr, Fields, Ident, LitStr, Result};

enum Role {
    Mapped(Option<Expr>),
    Id,
    Parent,
    Expando,
    Skip,
}

struct ModelField {
    ident: Ident,
    role: Role,
}

fn parse_kind(input: &DeriveInput) -> Result<String> {
    let mut kind = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("kind") {
                let value: LitStr = meta.value()?.parse()?;
                kind = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `kind = \"...\"`"))
            }
        })?;
    }

    Ok(kind.unwrap_or_else(|| input.ident.to_string()))
}

fn parse_field(field: &syn::Field) -> Result<ModelField> {
    let Some(ident) = field.ident.clone() else {
        return Err(Error::new_spanned(field, "Model fields must be named"));
    };
    let mut role = None;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("model")) {
        attr.parse_nested_meta(|meta| {
            let next = if meta.path.is_ident("id") {
                Role::Id
            } else if meta.path.is_ident("parent") {
                Role::Parent
            } else if meta.path.is_ident("expando") {
                Role::Expando
            } else if meta.path.is_ident("skip") {
                Role::Skip
            } else if meta.path.is_ident("property") {
                Role::Mapped(Some(meta.value()?.parse()?))
            } else {
                return Err(meta.error("expected one of `id`, `parent`, `expando`, `skip`, `property = ...`"));
            };

            if role.is_some() {
                return Err(meta.error("a field takes at most one model attribute"));
            }
            role = Some(next);
            Ok(())
        })?;
    }

    Ok(ModelField {
        ident,
        role: role.unwrap_or(Role::Mapped(None)),
    })
}

fn single<'a>(fields: &'a [ModelField], pick: fn(&Role) -> bool, what: &str) -> Result<Option<&'a Ident>> {
    let mut found = fields.iter().filter(|field| pick(&field.role));
    let first = found.next();

    if let Some(second) = found.next() {
        return Err(Error::new_spanned(&second.ident, format!("only one field may be marked `{what}`")));
    }

    Ok(first.map(|field| &field.ident))
}

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    match expand(&input) {
        Ok(tokens) => tokens,
        Err(err) => err.to_compile_error(),
    }
}

fn expand(input: &DeriveInput) -> Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new_spanned(other, "Model can only be derived for structs with named fields"));
            }
        },
        _ => {
            return Err(Error::new_spanned(ident, "Model can only be derived for structs with named fields"));
        }
    };

    let kind = parse_kind(input)?;
    let mut fields = named.iter().map(parse_field).collect::<Result<Vec<_>>>()?;

    // A field called `id` is the identifier unless another field claims it.
    if !fields.iter().any(|field| matches!(field.role, Role::Id)) {
        if let Some(field) = fields
            .iter_mut()
            .find(|field| field.ident == "id" && matches!(field.role, Role::Mapped(None)))
        {
            field.role = Role::Id;
        }
    }

    let Some(id) = single(&fields, |role| matches!(role, Role::Id), "id")? else {
        return Err(Error::new_spanned(ident, "Model needs an `id` field or a field marked `#[model(id)]`"));
    };
    let parent = single(&fields, |role| matches!(role, Role::Parent), "parent")?;
    let expando = single(&fields, |role| matches!(role, Role::Expando), "expando")?;

    let id_field = id.to_string();
    let is_expando = expando.is_some();

    let entries = fields.iter().filter_map(|field| {
        let field_ident = &field.ident;
        let name = field_ident.to_string();

        match &field.role {
            Role::Mapped(Some(property)) => Some(quote! {
                ::entlayer::model::Field::new(
                    #name,
                    #property,
                    |model: &Self| &model.#field_ident,
                    |model: &mut Self| &mut model.#field_ident,
                )
            }),
            Role::Mapped(None) => Some(quote! {
                ::entlayer::model::Field::inferred(
                    #name,
                    |model: &Self| &model.#field_ident,
                    |model: &mut Self| &mut model.#field_ident,
                )
            }),
            _ => None,
        }
    });

    let parent_hooks = parent.map(|parent| {
        quote! {
            fn parent(&self) -> Option<&::entlayer::key::Key> {
                self.#parent.as_ref()
            }

            fn set_parent(&mut self, parent: Option<::entlayer::key::Key>) {
                self.#parent = parent;
            }
        }
    });

    let expando_hooks = expando.map(|expando| {
        quote! {
            fn dynamic_properties(&self) -> Option<&dyn ::entlayer::model::DynamicProperties> {
                Some(&self.#expando)
            }

            fn dynamic_properties_mut(&mut self) -> Option<&mut dyn ::entlayer::model::DynamicProperties> {
                Some(&mut self.#expando)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::entlayer::model::Model for #ident #ty_generics #where_clause {
            const KIND: &'static str = #kind;
            const ID_FIELD: &'static str = #id_field;
            const EXPANDO: bool = #is_expando;

            fn fields() -> ::std::vec::Vec<::entlayer::model::Field<Self>> {
                ::std::vec![#(#entries),*]
            }

            fn id(&self) -> Option<::entlayer::key::KeyId> {
                ::entlayer::model::KeyIdentifier::to_key_id(&self.#id)
            }

            fn set_id(
                &mut self,
                id: Option<::entlayer::key::KeyId>,
            ) -> ::std::result::Result<(), ::entlayer::key::KeyId> {
                self.#id = ::entlayer::model::KeyIdentifier::from_key_id(id)?;
                Ok(())
            }

            #parent_hooks

            #expando_hooks
        }
    })
}
