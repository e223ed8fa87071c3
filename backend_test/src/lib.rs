use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, spanned::Spanned, FnArg, GenericArgument, Ident,
    ItemFn, Pat, PathArguments, Signature, Token, Type,
};

/// Transform an asynchronous test into a synchronous one running over a fresh
/// store, and inject dependencies.
///
/// Injectable dependencies, in any order, are
/// [`rocket::local::asynchronous::Client`], [`crate::model::store::StoreHandle`]
/// and [`crate::model::store::Coll<T>`]. All of them share the same store.
///
/// Arguments, comma separated:
/// - `seeded` inserts the demo candidates and voters before the test runs.
/// - `mongo` runs over a MongoDB database of the test's own instead of the
///   in-memory store, and drops it afterwards. Such tests are ignored unless
///   requested, since they need a server (`VOTESIM_TEST_DB_URI`, by default
///   `mongodb://localhost:27017`).
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);
    let flags = parse_macro_input!(args with Punctuated::<Ident, Token![,]>::parse_terminated);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    let mut seeded = false;
    let mut mongo = false;
    for flag in flags {
        if flag == "seeded" {
            seeded = true;
        } else if flag == "mongo" {
            mongo = true;
        } else {
            return syn::Error::new(flag.span(), "Expected `seeded`, `mongo` or no argument")
                .into_compile_error()
                .into();
        }
    }

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Pick the store.
    let (maybe_ignore, make_store) = if mongo {
        (
            quote! {
                #[ignore = "needs a MongoDB server, see VOTESIM_TEST_DB_URI"]
            },
            quote! {
                let (store, test_db) = crate::mongo_test_store().await;
                let test_db = Some(test_db);
            },
        )
    } else {
        (
            quote! {},
            quote! {
                let store: crate::model::store::StoreHandle =
                    std::sync::Arc::new(crate::model::store::MemoryStore::new());
                let test_db: Option<mongodb::Database> = None;
            },
        )
    };

    // Seed the store if needed.
    let maybe_seed = if seeded {
        quote! {
            crate::seed::ensure_seed_data(&store).await.unwrap();
        }
    } else {
        quote! {}
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #maybe_ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::model::store::StoreHandle,
                Option<mongodb::Database>,
            ) {
                #make_store

                #maybe_seed

                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_store(store.clone()),
                )
                .await
                .unwrap();

                (rocket_client, store, test_db)
            }

            /// The test itself.
            #item_fn

            // This test actually enters backend code, so enable logging.
            log4rs_test_utils::test_logging::init_logging_once_for(
                ["votesim_backend"],
                None,
                None,
            );

            // Several workers, so tests that spawn tasks really run them concurrently.
            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            let (rocket_client, store, test_db) = runtime.block_on(setup());

            // Run the test, catching any panics so cleanup still happens.
            // Everything the test uses is dropped inside the runtime.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(async move {
                    #[allow(unused_variables)]
                    let rocket_client = rocket_client;
                    #[allow(unused_variables)]
                    let store = store;
                    #new_name(#(#test_args),*).await
                })
            }));

            // Test cleanup.
            if let Some(db) = test_db {
                runtime.block_on(db.drop(None)).unwrap();
            }

            // Propagate any panic.
            if let Err(panic) = result {
                std::panic::resume_unwind(panic);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, build the expression injected for each
/// parameter, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                if let Some(last) = type_path.path.segments.last() {
                    if last.ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if last.ident == "StoreHandle" {
                        args.push(quote! { store.clone() });
                        continue;
                    } else if last.ident == "Coll" {
                        if let PathArguments::AngleBracketed(generics) = &last.arguments {
                            if let Some(GenericArgument::Type(record)) = generics.args.first() {
                                args.push(quote! {
                                    crate::model::store::Coll::<#record>::from_store(&store)
                                });
                                continue;
                            }
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `store_ident: StoreHandle` or `collection_ident: Coll<T>`",
        ));
    }

    Ok(args)
}
