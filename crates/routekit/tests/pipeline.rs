//! End-to-end behavior of the action pipeline through the hyper driver.

use routekit::prelude::*;
use routekit::{TestClient, TestRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use validator::Validate;

async fn client(store: MetadataStore, options: RoutingOptions) -> TestClient {
    let options = options.store(Arc::new(store)).development(true);
    TestClient::new(create_server(&options).await.unwrap())
}

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[derive(Default)]
struct Users;

#[derive(Default)]
struct Posts;

#[derive(Default)]
struct Answers;

#[tokio::test]
async fn parameters_bind_by_index_whichever_resolves_last() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/ordered",
            "ordered",
            method(|_: Arc<Users>, args: Args| async move { Ok::<_, HttpError>(json!(args.values())) }),
        ));
    for (index, delay) in [(2usize, 5u64), (0, 40), (1, 20)] {
        store.register(ParamDeclaration::custom::<Users>(
            "ordered",
            index,
            param_transform(move |_, _| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Some(json!(format!("p{}", index))))
            }),
        ));
    }
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client
        .get("/users/ordered")
        .await
        .assert_status(200)
        .assert_json(&json!(["p0", "p1", "p2"]));
}

#[tokio::test]
async fn interceptors_run_by_descending_priority_stable_on_ties() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/",
            "list",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(json!([])) }),
        ));
    for (index, priority) in [1, 5, 5, 2].into_iter().enumerate() {
        store.register(
            InterceptorDeclaration::instance(FnInterceptor::new(move |_, result| match result {
                Output::Value(Value::Array(mut seen)) => {
                    seen.push(json!(index));
                    Ok(Output::Value(Value::Array(seen)))
                }
                other => Ok(other),
            }))
            .global()
            .priority(priority),
        );
    }
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client.get("/users").await.assert_status(200).assert_json(&json!([1, 2, 3, 0]));
}

#[tokio::test]
async fn one_request_executes_one_action() {
    let calls = counter();
    let store = MetadataStore::new();
    let get_calls = calls.clone();
    let all_calls = calls.clone();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/twice",
            "get_twice",
            method(move |_: Arc<Users>, _args: Args| {
                let calls = get_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HttpError>(json!("get"))
                }
            }),
        ))
        .register(ActionDeclaration::all::<Users>(
            "/twice",
            "any_twice",
            method(move |_: Arc<Users>, _args: Args| {
                let calls = all_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HttpError>(json!("all"))
                }
            }),
        ));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client.get("/users/twice").await.assert_status(200).assert_json(&json!("get"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client
        .request(TestRequest::post("/users/twice"))
        .await
        .assert_status(200)
        .assert_json(&json!("all"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_required_parameter_never_reaches_the_handler() {
    let calls = counter();
    let handler_calls = calls.clone();
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/search",
            "search",
            method(move |_: Arc<Users>, args: Args| {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let term: String = args.get(0)?;
                    Ok::<_, HttpError>(json!({ "term": term }))
                }
            }),
        ))
        .register(ParamDeclaration::query::<Users>("search", 0, "q").required(true));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    let response = client.get("/users/search").await;
    response.assert_status(400).assert_body_contains("'q' is required");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    client
        .get("/users/search?q=ada")
        .await
        .assert_status(200)
        .assert_json(&json!({"term": "ada"}));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn undefined_and_null_results() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/nothing",
            "nothing",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(()) }),
        ))
        .register(ActionDeclaration::get::<Users>(
            "/null",
            "null",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(Output::null()) }),
        ));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client.get("/users/nothing").await.assert_status(404);

    let response = client.get("/users/null").await;
    response.assert_status(204);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn global_defaults_apply_to_empty_results() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/null",
            "null",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(Output::null()) }),
        ))
        .register(ActionDeclaration::get::<Users>(
            "/nothing",
            "nothing",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(()) }),
        ))
        .register(ResponseHandlerDeclaration::action::<Users>(
            "nothing",
            ResponseHandlerKind::OnUndefined(OnEmpty::Status(StatusCode::CREATED)),
        ));
    let config = RoutingConfig {
        null_result_code: Some(404),
        undefined_result_code: Some(200),
        ..RoutingConfig::default()
    };
    let options = RoutingOptions::new()
        .with_config(config)
        .container(DefaultContainer::new().with(Users));
    let client = client(store, options).await;

    client.get("/users/null").await.assert_status(404);
    client.get("/users/nothing").await.assert_status(201);
}

#[derive(Debug, Serialize, Deserialize, Validate)]
struct NewUser {
    #[validate(length(min = 3))]
    name: String,
    #[validate(email)]
    email: String,
}

#[tokio::test]
async fn validation_failure_skips_handler_and_interceptors() {
    let handler_calls = counter();
    let interceptor_calls = counter();
    let store = MetadataStore::new();
    let calls = handler_calls.clone();
    let intercepted = interceptor_calls.clone();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::post::<Users>(
            "/",
            "create",
            method(move |_: Arc<Users>, args: Args| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let user: NewUser = args.get(0)?;
                    Ok::<_, HttpError>(json!({ "name": user.name }))
                }
            }),
        ))
        .register(ParamDeclaration::body::<Users>("create", 0).typed(TargetType::validated::<NewUser>()))
        .register(UseDeclaration::interceptor::<Users>(
            Some("create"),
            InterceptorHandle::instance(FnInterceptor::new(move |_, result| {
                intercepted.fetch_add(1, Ordering::SeqCst);
                Ok(result)
            })),
        ));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    let response = client
        .post_json("/users", &json!({"name": "al", "email": "nope"}))
        .await;
    response.assert_status(400).assert_body_contains("email");
    let body: Value = response.json().unwrap();
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    assert_eq!(interceptor_calls.load(Ordering::SeqCst), 0);

    client
        .post_json("/users", &json!({"name": "ada", "email": "ada@example.com"}))
        .await
        .assert_status(200)
        .assert_json(&json!({"name": "ada"}));
    assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
    assert_eq!(interceptor_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn body_of_the_wrong_shape_is_a_client_error() {
    let calls = counter();
    let handler_calls = calls.clone();
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::post::<Users>(
            "/",
            "create",
            method(move |_: Arc<Users>, _args: Args| {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, HttpError>(json!("created"))
                }
            }),
        ))
        .register(ParamDeclaration::body::<Users>("create", 0).typed(TargetType::model::<NewUser>()));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    let response = client.post_json("/users", &json!({"nom": "x"})).await;
    response.assert_status(400).assert_body_contains("missing field `name`");
    let body: Value = response.json().unwrap();
    assert_eq!(body["error"]["type"], "invalid_param");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn action_transform_option_overrides_controller() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users").transform_response(false))
        .register(
            ActionDeclaration::get::<Users>(
                "/transformed",
                "transformed",
                method(|_: Arc<Users>, _args: Args| async move {
                    Ok::<_, HttpError>(json!({"name": "ada", "_password": "secret"}))
                }),
            )
            .transform_response(true),
        )
        .register(ActionDeclaration::get::<Users>(
            "/raw",
            "raw",
            method(|_: Arc<Users>, _args: Args| async move {
                Ok::<_, HttpError>(json!({"name": "ada", "_password": "secret"}))
            }),
        ));
    let mut options = RoutingOptions::new().container(DefaultContainer::new().with(Users));
    options.class_to_plain_options = ClassTransformOptions::default().exclude_prefix("_");
    let client = client(store, options).await;

    client
        .get("/users/transformed")
        .await
        .assert_json(&json!({"name": "ada"}));
    client
        .get("/users/raw")
        .await
        .assert_json(&json!({"name": "ada", "_password": "secret"}));
}

#[tokio::test]
async fn path_parameter_is_the_sole_argument() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/api"))
        .register(ActionDeclaration::get::<Users>(
            "/users/:id",
            "get_one",
            method(|_: Arc<Users>, args: Args| async move {
                Ok::<_, HttpError>(json!({ "id": args.raw(0), "count": args.len() }))
            }),
        ))
        .register(ParamDeclaration::param::<Users>("get_one", 0, "id"))
        .register(ActionDeclaration::get::<Users>(
            "/accounts/:id",
            "get_account",
            method(|_: Arc<Users>, args: Args| async move {
                Ok::<_, HttpError>(json!({ "id": args.raw(0), "count": args.len() }))
            }),
        ))
        .register(ParamDeclaration::param::<Users>("get_account", 0, "id").typed(TargetType::Number));
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client
        .get("/api/users/42")
        .await
        .assert_status(200)
        .assert_json(&json!({"id": "42", "count": 1}));
    client
        .get("/api/accounts/42")
        .await
        .assert_status(200)
        .assert_json(&json!({"id": 42, "count": 1}));
}

#[tokio::test]
async fn each_controller_serves_its_own_route() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Posts>(""))
        .register(ActionDeclaration::get::<Posts>(
            "/posts",
            "all",
            method(|_: Arc<Posts>, _args: Args| async move {
                Ok::<_, HttpError>(json!([{"id": 1, "title": "post #1"}, {"id": 2, "title": "post #2"}]))
            }),
        ))
        .register(ControllerDeclaration::json::<Answers>(""))
        .register(ActionDeclaration::get::<Answers>(
            "/answers",
            "all",
            method(|_: Arc<Answers>, _args: Args| async move {
                Ok::<_, HttpError>(json!([{"id": 1, "title": "answer #1"}]))
            }),
        ));
    let options = RoutingOptions::new().container(DefaultContainer::new().with(Posts).with(Answers));
    let client = client(store, options).await;

    client
        .get("/posts")
        .await
        .assert_status(200)
        .assert_json(&json!([{"id": 1, "title": "post #1"}, {"id": 2, "title": "post #2"}]));
    client
        .get("/answers")
        .await
        .assert_status(200)
        .assert_json(&json!([{"id": 1, "title": "answer #1"}]));
}

#[tokio::test]
async fn higher_priority_middleware_runs_first() {
    let seen: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let low = seen.clone();
    let high = seen.clone();
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/",
            "list",
            method(|_: Arc<Users>, _args: Args| async move { Ok::<_, HttpError>(json!([])) }),
        ))
        .register(
            MiddlewareDeclaration::instance(
                MiddlewarePhase::Before,
                FnMiddleware::new(move |_| {
                    low.lock().unwrap().push("low");
                    Ok(())
                }),
            )
            .global()
            .priority(1),
        )
        .register(
            MiddlewareDeclaration::instance(
                MiddlewarePhase::Before,
                FnMiddleware::new(move |_| {
                    high.lock().unwrap().push("high");
                    Ok(())
                }),
            )
            .global()
            .priority(10),
        );
    let client = client(store, RoutingOptions::new().container(DefaultContainer::new().with(Users))).await;

    client.get("/users").await.assert_status(200);
    client.get("/users").await.assert_status(200);
    assert_eq!(*seen.lock().unwrap(), vec!["high", "low", "high", "low"]);
}

#[tokio::test]
async fn current_user_parameters() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/me",
            "me",
            method(|_: Arc<Users>, args: Args| async move {
                let user: Value = args.get(0)?;
                Ok::<_, HttpError>(user)
            }),
        ))
        .register(ParamDeclaration::current_user::<Users>("me", 0).required(true));
    let options = RoutingOptions::new()
        .container(DefaultContainer::new().with(Users))
        .current_user_checker(FnCurrentUserChecker::new(|ctx| {
            ctx.header("x-user").map(|name| json!({ "name": name }))
        }));
    let client = client(store, options).await;

    client.get("/users/me").await.assert_status(401);
    client
        .request(TestRequest::get("/users/me").header("X-User", "ada"))
        .await
        .assert_status(200)
        .assert_json(&json!({"name": "ada"}));
}

#[tokio::test]
async fn disabled_error_handler_writes_status_only() {
    let store = MetadataStore::new();
    store
        .register(ControllerDeclaration::json::<Users>("/users"))
        .register(ActionDeclaration::get::<Users>(
            "/broken",
            "broken",
            method(|_: Arc<Users>, _args: Args| async move {
                Err::<Output, HttpError>(HttpError::internal("database unavailable"))
            }),
        ));
    let config = RoutingConfig {
        default_error_handler: false,
        ..RoutingConfig::default()
    };
    let options = RoutingOptions::new()
        .with_config(config)
        .container(DefaultContainer::new().with(Users));
    let client = client(store, options).await;

    let response = client.get("/users/broken").await;
    response.assert_status(500);
    assert!(response.body().is_empty());
}
