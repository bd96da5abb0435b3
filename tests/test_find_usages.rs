//! End-to-end usage searches through `AnalysisHost`.

mod common;

use common::{Src, has_code, host_with, host_with_config, summary};
use rstest::rstest;
use tokio_util::sync::CancellationToken;
use usages::hir::codes;
use usages::ide::{UsageVisitor, filter_candidates};
use usages::syntax::build::*;
use usages::syntax::{ClassRef, SourceFile, Stmt};
use usages::{AnalysisHost, Confidence, SearchConfig, SearchError, UsageKind};

// ============================================================================
// FIXTURES
// ============================================================================

const DECL: Src = Src::new("decl.php", "class Widget {}");
const USE: Src = Src::new("use.php", "<?php\n\nnew Widget();\n");

fn round_trip_files() -> Vec<SourceFile> {
    vec![
        DECL.file(vec![
            ClassBuilder::class(ident("Widget", DECL.at("Widget", 0)), DECL.at(DECL.text, 0))
                .stmt(),
        ]),
        USE.file(vec![expr_stmt(new_named(
            name("Widget", USE.at("Widget", 0)),
            USE.at("new Widget()", 0),
        ))]),
    ]
}

const UI: Src = Src::new(
    "src/Ui/Widget.php",
    "namespace App\\Ui;\n\nclass Widget\n{\n    public function render() {}\n}\n",
);
const MAIN: Src = Src::new(
    "src/main.php",
    "<?php\nuse App\\Ui\\Widget;\n\nfunction build(): Widget\n{\n    $w = new Widget();\n    $w->render();\n    return $w;\n}\n",
);

fn app_files() -> Vec<SourceFile> {
    vec![
        UI.file(vec![
            namespace(name("App\\Ui", UI.at("App\\Ui", 0)), UI.at("namespace App\\Ui;", 0)),
            ClassBuilder::class(ident("Widget", UI.at("Widget", 0)), UI.at("class Widget", 0))
                .method(MethodBuilder::new(ident("render", UI.at("render", 0))).build())
                .stmt(),
        ]),
        MAIN.file(vec![
            use_class(
                name("App\\Ui\\Widget", MAIN.at("App\\Ui\\Widget", 0)),
                None,
                MAIN.at("use App\\Ui\\Widget;", 0),
            ),
            FunctionBuilder::new(ident("build", MAIN.at("build", 0)))
                .returns(named_type(name("Widget", MAIN.at("Widget", 1))))
                .body(vec![
                    expr_stmt(assign(
                        var("w", MAIN.at("$w", 0)),
                        new_named(name("Widget", MAIN.at("Widget", 2)), MAIN.at("new Widget()", 0)),
                        MAIN.at("$w = new Widget()", 0),
                    )),
                    expr_stmt(method_call(
                        var("w", MAIN.at("$w", 1)),
                        ident("render", MAIN.at("render", 0)),
                        MAIN.at("$w->render()", 0),
                    )),
                    Stmt::Return(Some(var("w", MAIN.at("$w", 2))), MAIN.at("return $w;", 0)),
                ])
                .stmt(),
        ]),
    ]
}

const SHAPES: Src = Src::new(
    "src/shapes.php",
    "class Base { function method() {} }\nclass Derived extends Base {}\nclass Over extends Base { function method() {} }\n",
);
const CALLS: Src = Src::new(
    "src/calls.php",
    "(new Derived())->method();\nfunction run(Over $o) { $o->method(); }\n",
);

fn hierarchy_files() -> Vec<SourceFile> {
    vec![
        SHAPES.file(vec![
            ClassBuilder::class(ident("Base", SHAPES.at("Base", 0)), SHAPES.at("class Base", 0))
                .method(MethodBuilder::new(ident("method", SHAPES.at("method", 0))).build())
                .stmt(),
            ClassBuilder::class(
                ident("Derived", SHAPES.at("Derived", 0)),
                SHAPES.at("class Derived", 0),
            )
            .extends(name("Base", SHAPES.at("Base", 1)))
            .stmt(),
            ClassBuilder::class(ident("Over", SHAPES.at("Over", 0)), SHAPES.at("class Over", 0))
                .extends(name("Base", SHAPES.at("Base", 2)))
                .method(MethodBuilder::new(ident("method", SHAPES.at("method", 1))).build())
                .stmt(),
        ]),
        CALLS.file(vec![
            expr_stmt(method_call(
                new_named(
                    name("Derived", CALLS.at("Derived", 0)),
                    CALLS.at("new Derived()", 0),
                ),
                ident("method", CALLS.at("method", 0)),
                CALLS.at("(new Derived())->method()", 0),
            )),
            FunctionBuilder::new(ident("run", CALLS.at("run", 0)))
                .param(param(
                    "o",
                    Some(named_type(name("Over", CALLS.at("Over", 0)))),
                    CALLS.at("Over $o", 0),
                ))
                .body(vec![expr_stmt(method_call(
                    var("o", CALLS.at("$o", 1)),
                    ident("method", CALLS.at("method", 1)),
                    CALLS.at("$o->method()", 0),
                ))])
                .stmt(),
        ]),
    ]
}

const MAGIC: Src = Src::new(
    "src/magic.php",
    "class Magic { function __call($name, $args) {} }\nfunction use_it(Magic $m) { $m->missing(); }\n",
);

fn magic_files() -> Vec<SourceFile> {
    vec![MAGIC.file(vec![
        ClassBuilder::class(ident("Magic", MAGIC.at("Magic", 0)), MAGIC.at("class Magic", 0))
            .method(MethodBuilder::new(ident("__call", MAGIC.at("__call", 0))).build())
            .stmt(),
        FunctionBuilder::new(ident("use_it", MAGIC.at("use_it", 0)))
            .param(param(
                "m",
                Some(named_type(name("Magic", MAGIC.at("Magic", 1)))),
                MAGIC.at("Magic $m", 0),
            ))
            .body(vec![expr_stmt(method_call(
                var("m", MAGIC.at("$m", 1)),
                ident("missing", MAGIC.at("missing", 0)),
                MAGIC.at("$m->missing()", 0),
            ))])
            .stmt(),
    ])]
}

const TRACED: Src = Src::new("src/factory.php", "$cls = 'Widget';\nnew $cls();\n");

fn traced_file() -> SourceFile {
    TRACED.file(vec![
        expr_stmt(assign(
            var("cls", TRACED.at("$cls", 0)),
            string("Widget", TRACED.at("'Widget'", 0)),
            TRACED.at("$cls = 'Widget'", 0),
        )),
        expr_stmt(new_object(
            ClassRef::Dynamic(Box::new(var("cls", TRACED.at("$cls", 1)))),
            TRACED.at("new $cls()", 0),
        )),
    ])
}

const RELATIVE: Src = Src::new(
    "src/relative.php",
    "class Base { static function make() {} const KIND = 1; }\nclass Child extends Base {\n    static function make() { parent::make(); }\n    function build() { self::make(); static::make(); return new self(); }\n    function kind() { return self::KIND; }\n    function same($o) { return $o instanceof self; }\n}\nfunction loose() { self::make(); return new self(); }\n",
);

fn relative_file() -> SourceFile {
    let r = |needle: &str, nth: usize| RELATIVE.at(needle, nth);
    RELATIVE.file(vec![
        ClassBuilder::class(ident("Base", r("Base", 0)), r("class Base", 0))
            .method(MethodBuilder::new(ident("make", r("make", 0))).is_static().build())
            .constant(ident("KIND", r("KIND", 0)))
            .stmt(),
        ClassBuilder::class(ident("Child", r("Child", 0)), r("class Child", 0))
            .extends(name("Base", r("Base", 1)))
            .method(
                MethodBuilder::new(ident("make", r("make", 1)))
                    .is_static()
                    .body(vec![expr_stmt(static_call(
                        ClassRef::Parent(r("parent", 0)),
                        ident("make", r("make", 2)),
                        r("parent::make()", 0),
                    ))])
                    .build(),
            )
            .method(
                MethodBuilder::new(ident("build", r("build", 0)))
                    .body(vec![
                        expr_stmt(static_call(
                            ClassRef::SelfRef(r("self", 0)),
                            ident("make", r("make", 3)),
                            r("self::make()", 0),
                        )),
                        expr_stmt(static_call(
                            ClassRef::Static(r("static", 2)),
                            ident("make", r("make", 4)),
                            r("static::make()", 0),
                        )),
                        Stmt::Return(
                            Some(new_object(ClassRef::SelfRef(r("self", 1)), r("new self()", 0))),
                            r("return new self();", 0),
                        ),
                    ])
                    .build(),
            )
            .method(
                MethodBuilder::new(ident("kind", r("kind", 0)))
                    .body(vec![Stmt::Return(
                        Some(class_const(
                            ClassRef::SelfRef(r("self", 2)),
                            ident("KIND", r("KIND", 1)),
                            r("self::KIND", 0),
                        )),
                        r("return self::KIND;", 0),
                    )])
                    .build(),
            )
            .method(
                MethodBuilder::new(ident("same", r("same", 0)))
                    .param(param("o", None, r("$o", 0)))
                    .body(vec![Stmt::Return(
                        Some(instance_of(
                            var("o", r("$o", 1)),
                            ClassRef::SelfRef(r("self", 3)),
                            r("$o instanceof self", 0),
                        )),
                        r("return $o instanceof self;", 0),
                    )])
                    .build(),
            )
            .stmt(),
        FunctionBuilder::new(ident("loose", r("loose", 0)))
            .body(vec![
                expr_stmt(static_call(
                    ClassRef::SelfRef(r("self", 4)),
                    ident("make", r("make", 5)),
                    r("self::make()", 1),
                )),
                Stmt::Return(
                    Some(new_object(ClassRef::SelfRef(r("self", 5)), r("new self()", 1))),
                    r("return new self();", 1),
                ),
            ])
            .stmt(),
    ])
}

const MIXED: Src = Src::new(
    "src/mixed.php",
    "<?php\nnew widget();\n(new Derived())->METHOD();\n",
);

fn mixed_case_file() -> SourceFile {
    MIXED.file(vec![
        expr_stmt(new_named(
            name("widget", MIXED.at("widget", 0)),
            MIXED.at("new widget()", 0),
        )),
        expr_stmt(method_call(
            new_named(
                name("Derived", MIXED.at("Derived", 0)),
                MIXED.at("new Derived()", 0),
            ),
            ident("METHOD", MIXED.at("METHOD", 0)),
            MIXED.at("(new Derived())->METHOD()", 0),
        )),
    ])
}

fn corpus() -> Vec<SourceFile> {
    let mut files = round_trip_files();
    files.extend(app_files());
    files.extend(hierarchy_files());
    files.extend(magic_files());
    files.push(traced_file());
    files.push(mixed_case_file());
    files
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_round_trip_single_instantiation() {
    let mut host = host_with(round_trip_files());
    let result = host.analysis().find_usages("Widget").unwrap();

    assert_eq!(
        summary(&result.usages),
        vec![("use.php", 3, UsageKind::Instantiation, Confidence::Certain)]
    );
    let usage = &result.usages[0];
    assert_eq!(usage.column, 5);
    assert_eq!(usage.snippet.as_ref(), "new Widget();");
    assert_eq!(usage.context.start_line, 1);
    assert_eq!(usage.context.lines[2].as_ref(), "new Widget();");
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
}

#[rstest]
#[case("App\\Ui\\Widget")]
#[case("\\App\\Ui\\Widget")]
#[case("app\\ui\\WIDGET")]
fn test_namespaced_type_usages(#[case] query: &str) {
    let mut host = host_with(app_files());
    let result = host.analysis().find_usages(query).unwrap();

    assert_eq!(
        summary(&result.usages),
        vec![
            ("src/main.php", 2, UsageKind::Import, Confidence::Certain),
            ("src/main.php", 4, UsageKind::TypePosition, Confidence::Certain),
            ("src/main.php", 6, UsageKind::Instantiation, Confidence::Certain),
        ]
    );
}

#[test]
fn test_member_call_through_local_variable_is_possible() {
    let mut host = host_with(app_files());
    let result = host.analysis().find_usages("App\\Ui\\Widget::render").unwrap();

    assert_eq!(
        summary(&result.usages),
        vec![(
            "src/main.php",
            7,
            UsageKind::InstanceMemberAccess,
            Confidence::Possible
        )]
    );
}

#[rstest]
#[case("Base::method", 1)]
#[case("Derived::method", 1)]
#[case("Over::method()", 2)]
fn test_inherited_member_resolution(#[case] query: &str, #[case] line: u32) {
    let mut host = host_with(hierarchy_files());
    let result = host.analysis().find_usages(query).unwrap();

    assert_eq!(result.len(), 1, "{query}: {:?}", summary(&result.usages));
    let usage = &result.usages[0];
    assert_eq!(usage.path.as_ref(), "src/calls.php");
    assert_eq!(usage.line, line);
    assert_eq!(usage.kind, UsageKind::InstanceMemberAccess);
    assert!(usage.confidence >= Confidence::Probable);
}

#[test]
fn test_catch_all_dispatch_is_dynamic() {
    let mut host = host_with(magic_files());
    let result = host.analysis().find_usages("Magic::missing").unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.usages[0].line, 2);
    assert_eq!(result.usages[0].confidence, Confidence::Dynamic);
}

#[test]
fn test_traced_class_string_is_possible() {
    let mut host = host_with(vec![round_trip_files().remove(0), traced_file()]);
    let result = host.analysis().find_usages("Widget").unwrap();

    let instantiations: Vec<_> = result
        .usages
        .iter()
        .filter(|u| u.kind == UsageKind::Instantiation)
        .collect();
    assert_eq!(instantiations.len(), 1);
    assert_eq!(instantiations[0].line, 2);
    assert_eq!(instantiations[0].confidence, Confidence::Possible);
}

#[test]
fn test_function_call_in_namespace() {
    let src = Src::new("src/helpers.php", "namespace App;\nfunction helper() {}\nhelper();\n");
    let file = src.file(vec![
        namespace(name("App", src.at("App", 0)), src.at("namespace App;", 0)),
        FunctionBuilder::new(ident("helper", src.at("helper", 0))).stmt(),
        expr_stmt(call(
            name("helper", src.at("helper", 1)),
            Vec::new(),
            src.at("helper()", 1),
        )),
    ]);
    let mut host = host_with(vec![file]);
    let result = host.analysis().find_usages("App\\helper()").unwrap();

    assert_eq!(
        summary(&result.usages),
        vec![("src/helpers.php", 3, UsageKind::FunctionCall, Confidence::Certain)]
    );
}

#[test]
fn test_import_beats_current_namespace() {
    let app = Src::new("src/App/Widget.php", "namespace App;\nclass Widget {}\n");
    let other = Src::new("src/Other/Widget.php", "namespace Other;\nclass Widget {}\n");
    let main = Src::new("src/App/main.php", "namespace App;\nuse Other\\Widget;\nnew Widget();\n");

    let declare = |src: &Src, ns: &str| {
        src.file(vec![
            namespace(name(ns, src.at(ns, 0)), src.at("namespace", 0)),
            ClassBuilder::class(ident("Widget", src.at("Widget", 0)), src.at("class Widget {}", 0))
                .stmt(),
        ])
    };
    let files = vec![
        declare(&app, "App"),
        declare(&other, "Other"),
        main.file(vec![
            namespace(name("App", main.at("App", 0)), main.at("namespace App;", 0)),
            use_class(
                name("Other\\Widget", main.at("Other\\Widget", 0)),
                None,
                main.at("use Other\\Widget;", 0),
            ),
            expr_stmt(new_named(
                name("Widget", main.at("Widget", 1)),
                main.at("new Widget()", 0),
            )),
        ]),
    ];
    let mut host = host_with(files);
    let analysis = host.analysis();

    assert!(analysis.find_usages("App\\Widget").unwrap().is_empty());
    assert_eq!(
        summary(&analysis.find_usages("Other\\Widget").unwrap().usages),
        vec![
            ("src/App/main.php", 2, UsageKind::Import, Confidence::Certain),
            ("src/App/main.php", 3, UsageKind::Instantiation, Confidence::Certain),
        ]
    );
}

#[rstest]
#[case::self_and_static_calls("Child::make", vec![
    ("src/relative.php", 4, UsageKind::StaticMemberAccess, Confidence::Certain),
    ("src/relative.php", 4, UsageKind::StaticMemberAccess, Confidence::Certain),
    ("src/relative.php", 8, UsageKind::DynamicCall, Confidence::Dynamic),
])]
#[case::parent_call("Base::make", vec![
    ("src/relative.php", 3, UsageKind::StaticMemberAccess, Confidence::Certain),
    ("src/relative.php", 8, UsageKind::DynamicCall, Confidence::Dynamic),
])]
#[case::self_as_a_type("Child", vec![
    ("src/relative.php", 4, UsageKind::StaticMemberAccess, Confidence::Certain),
    ("src/relative.php", 4, UsageKind::StaticMemberAccess, Confidence::Certain),
    ("src/relative.php", 4, UsageKind::Instantiation, Confidence::Certain),
    ("src/relative.php", 5, UsageKind::ConstantAccess, Confidence::Certain),
    ("src/relative.php", 6, UsageKind::TypePosition, Confidence::Certain),
])]
#[case::parent_as_a_type("Base", vec![
    ("src/relative.php", 2, UsageKind::InheritanceClause, Confidence::Certain),
    ("src/relative.php", 3, UsageKind::StaticMemberAccess, Confidence::Certain),
])]
fn test_relative_class_references(
    #[case] query: &str,
    #[case] expected: Vec<(&str, u32, UsageKind, Confidence)>,
) {
    let mut host = host_with(vec![relative_file()]);
    let result = host.analysis().find_usages(query).unwrap();
    assert_eq!(summary(&result.usages), expected);
}

#[test]
fn test_relative_class_reference_columns() {
    let mut host = host_with(vec![relative_file()]);
    let result = host.analysis().find_usages("Child").unwrap();
    let positions: Vec<_> = result.usages.iter().map(|u| (u.line, u.column)).collect();
    assert_eq!(positions, vec![(4, 24), (4, 38), (4, 65), (5, 30), (6, 46)]);
}

// ============================================================================
// QUERY HANDLING
// ============================================================================

#[rstest]
#[case("")]
#[case("   ")]
#[case("Widget::")]
#[case("::render")]
#[case("1Widget")]
#[case("App\\\\Widget")]
#[case("Widget::class")]
#[case("Wid get")]
fn test_malformed_query_yields_empty_result(#[case] query: &str) {
    let mut host = host_with(round_trip_files());
    let result = host.analysis().find_usages(query).unwrap();

    assert!(result.is_empty());
    assert!(has_code(&result.diagnostics, codes::MALFORMED_QUERY));
}

#[test]
fn test_unknown_symbol_has_no_usages() {
    let mut host = host_with(corpus());
    let result = host.analysis().find_usages("Nowhere\\Gizmo").unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_results_are_ranked_best_first() {
    let mut files = round_trip_files();
    files.push(traced_file());
    let mut host = host_with(files);
    let result = host.analysis().find_usages("Widget").unwrap();

    let tiers: Vec<_> = result.usages.iter().map(|u| u.confidence).collect();
    let mut sorted = tiers.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(tiers, sorted);
    assert_eq!(tiers.first(), Some(&Confidence::Certain));
    assert_eq!(result.with_confidence(Confidence::Possible).count(), 1);
}

// ============================================================================
// FILTER, DETERMINISM, LIMITS
// ============================================================================

#[rstest]
#[case("Widget")]
#[case("App\\Ui\\Widget")]
#[case("App\\Ui\\Widget::render")]
#[case("Base::method")]
#[case("Derived::method")]
#[case("Magic::missing")]
fn test_filter_never_drops_a_file_with_usages(#[case] raw: &str) {
    let files = corpus();
    let mut host = host_with(files.clone());
    let analysis = host.analysis();
    let query = analysis.resolve_query(raw).unwrap();
    let config = SearchConfig::default();

    let texts: Vec<&str> = files.iter().map(|f| f.text.as_ref()).collect();
    let candidates = filter_candidates(&query, &texts, &config);

    let visitor = UsageVisitor::new(&query, analysis.table(), &config);
    for (index, file) in files.iter().enumerate() {
        let Some(ast) = &file.ast else { continue };
        let found = visitor.visit(ast, &file.text, &file.path);
        if !found.is_empty() {
            assert!(
                candidates.contains(&index),
                "{raw}: {} has usages but was filtered out",
                file.path
            );
        }
    }
}

#[test]
fn test_mixed_case_spelling_is_found_alongside_exact_spelling() {
    let mut files = round_trip_files();
    files.extend(hierarchy_files());
    files.push(mixed_case_file());
    let mut host = host_with(files);
    let analysis = host.analysis();

    let widget = analysis.find_usages("Widget").unwrap();
    assert_eq!(
        summary(&widget.usages),
        vec![
            ("src/mixed.php", 2, UsageKind::Instantiation, Confidence::Certain),
            ("use.php", 3, UsageKind::Instantiation, Confidence::Certain),
        ]
    );

    let method = analysis.find_usages("Base::method").unwrap();
    assert!(
        method
            .usages
            .iter()
            .any(|u| u.path.as_ref() == "src/mixed.php" && u.line == 3),
        "{:?}",
        summary(&method.usages)
    );
}

#[rstest]
#[case("Widget")]
#[case("Base::method")]
#[case("App\\Ui\\Widget::render")]
fn test_parallel_and_sequential_agree(#[case] query: &str) {
    let mut parallel = host_with(corpus());
    let mut sequential = host_with_config(SearchConfig::default().with_parallel(false), corpus());

    let first = parallel.analysis().find_usages(query).unwrap();
    let again = parallel.analysis().find_usages(query).unwrap();
    let serial = sequential.analysis().find_usages(query).unwrap();

    assert_eq!(first, again);
    assert_eq!(first, serial);
}

#[test]
fn test_per_file_usage_limit() {
    let src = Src::new("many.php", "new Widget();\nnew Widget();\n");
    let files = vec![
        round_trip_files().remove(0),
        src.file(vec![
            expr_stmt(new_named(name("Widget", src.at("Widget", 0)), src.at("new Widget()", 0))),
            expr_stmt(new_named(name("Widget", src.at("Widget", 1)), src.at("new Widget()", 1))),
        ]),
    ];
    let mut host = host_with_config(SearchConfig::default().with_max_usages_per_file(1), files);
    let result = host.analysis().find_usages("Widget").unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.usages[0].line, 1);
    assert!(has_code(&result.diagnostics, codes::TRUNCATED_RESULTS));
}

#[test]
fn test_oversized_file_is_skipped() {
    let mut host = host_with_config(
        SearchConfig::default().with_max_file_bytes(DECL.text.len()),
        round_trip_files(),
    );
    let result = host.analysis().find_usages("Widget").unwrap();

    assert!(result.is_empty());
    let oversized: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.code == codes::OVERSIZED_FILE)
        .collect();
    assert_eq!(oversized.len(), 1);
    assert_eq!(oversized[0].file.as_deref(), Some("use.php"));
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_no_files_is_an_error() {
    let mut host = AnalysisHost::new();
    assert_eq!(host.analysis().find_usages("Widget"), Err(SearchError::NoFiles));
}

#[test]
fn test_cancelled_search() {
    let mut host = host_with(corpus());
    let token = CancellationToken::new();
    token.cancel();

    let result = host.analysis().find_usages_with_cancel("Widget", &token);
    assert_eq!(result, Err(SearchError::Cancelled));
}

#[test]
fn test_snapshot_is_isolated_from_later_indexing() {
    let mut host = host_with(round_trip_files());
    let before = host.analysis();

    let extra = Src::new("extra.php", "new Widget();\n");
    host.set_file(extra.file(vec![expr_stmt(new_named(
        name("Widget", extra.at("Widget", 0)),
        extra.at("new Widget()", 0),
    ))]));

    assert_eq!(before.find_usages("Widget").unwrap().len(), 1);
    assert_eq!(host.analysis().find_usages("Widget").unwrap().len(), 2);
    assert_eq!(before.file_count(), 2);
}
