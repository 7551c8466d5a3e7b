//! Unit tests for lumis-indexer module

use std::path::Path;

use crate::*;

fn extractor() -> UnitExtractor {
    UnitExtractor::new(ParserPool::new(1))
}

fn extract(file: &str, code: &str) -> Vec<ExtractedUnit> {
    let grammar = route(Path::new(file)).expect("routable test file");
    extractor().extract_blocking(grammar, code.as_bytes()).unwrap()
}

/// One line per unit: `name: [call, call]`.
fn render(units: &[ExtractedUnit]) -> String {
    units
        .iter()
        .map(|u| {
            let calls: Vec<&str> = u.calls.iter().map(String::as_str).collect();
            format!("{}: [{}]", u.name, calls.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_route() {
    let cases = [
        ("src/main.rs", Some(Grammar::Rust)),
        ("app.ts", Some(Grammar::TypeScript)),
        ("view.tsx", Some(Grammar::Tsx)),
        ("index.js", Some(Grammar::JavaScript)),
        ("index.mjs", Some(Grammar::JavaScript)),
        ("index.cjs", Some(Grammar::JavaScript)),
        ("lib.py", Some(Grammar::Python)),
        ("main.go", Some(Grammar::Go)),
        ("Main.java", Some(Grammar::Java)),
        ("main.c", Some(Grammar::C)),
        ("main.cpp", Some(Grammar::Cpp)),
        // Known language without a bundled grammar
        ("script.rb", None),
        ("logo.png", None),
        ("Makefile", None),
    ];
    for (file, expected) in cases {
        assert_eq!(route(Path::new(file)), expected, "routing {}", file);
    }
}

#[test]
fn test_python_extraction() {
    let units = extract(
        "app.py",
        r#"
def a():
    b()

def b():
    pass

class Service:
    def load(self, key):
        data = self.client.fetch(key)
        return parse(data)

    def outer(self):
        def inner():
            helper()
        return inner()
"#,
    );

    insta::assert_snapshot!(render(&units), @r"
    a: [b]
    b: []
    load: [fetch, parse]
    outer: [helper, inner]
    inner: [helper]
    ");
    assert_eq!(units[1].source_text, "def b():\n    pass");
}

#[test]
fn test_javascript_extraction() {
    let units = extract(
        "person.js",
        r#"
function greet(name) {
  return format(name);
}

class Person {
  constructor(name) {
    this.name = name;
  }

  greet() {
    return this.formatter.render(greet(this.name));
  }
}

const arrow = () => helper();
"#,
    );

    insta::assert_snapshot!(render(&units), @r"
    greet: [format]
    constructor: []
    greet: [greet, render]
    ");
}

#[test]
fn test_typescript_extraction() {
    let units = extract(
        "users.ts",
        r#"
export async function load(id: string): Promise<User> {
  const row = await db.users.find<User>(id);
  return toUser(row);
}
"#,
    );

    insta::assert_snapshot!(render(&units), @"load: [find, toUser]");
}

#[test]
fn test_go_extraction() {
    let units = extract(
        "main.go",
        r#"
package main

func main() {
	s := NewServer()
	s.Start()
	fmt.Println("ok")
}

func (s *Server) Start() error {
	return s.listen()
}
"#,
    );

    insta::assert_snapshot!(render(&units), @r"
    main: [NewServer, Println, Start]
    Start: [listen]
    ");
}

#[test]
fn test_rust_extraction() {
    let units = extract(
        "main.rs",
        r#"
fn main() {
    let cfg = Config::load();
    run(&cfg);
    cfg.validate();
}

impl Config {
    fn load() -> Self {
        Self::default()
    }
}
"#,
    );

    insta::assert_snapshot!(render(&units), @r"
    main: [load, run, validate]
    load: [default]
    ");
}

#[test]
fn test_java_extraction() {
    let units = extract(
        "Repo.java",
        r#"
class Repo {
    Repo() { init(); }

    List<User> findAll() {
        return this.db.query("select").stream().map(User::from).collect(toList());
    }
}
"#,
    );

    insta::assert_snapshot!(render(&units), @r"
    Repo: [init]
    findAll: [collect, map, query, stream, toList]
    ");
}

#[test]
fn test_c_family_extraction() {
    let units = extract(
        "buffer.c",
        r#"
static int *make_buffer(int n) {
    return alloc(n);
}

int main(void) {
    int *b = make_buffer(4);
    ctx->run(b);
    return 0;
}
"#,
    );
    insta::assert_snapshot!(render(&units), @r"
    make_buffer: [alloc]
    main: [make_buffer, run]
    ");

    let units = extract(
        "server.cpp",
        r#"
void Server::start() {
    this->listen();
    util::log("start");
}
"#,
    );
    insta::assert_snapshot!(render(&units), @"start: [listen, log]");
}

#[test]
fn test_duplicate_names_are_all_emitted() {
    let units = extract("dup.py", "def f():\n    a()\n\ndef f():\n    b()\n");
    assert_eq!(units.len(), 2);
    assert!(units[0].calls.contains("a"));
    assert!(units[1].calls.contains("b"));
}

#[test]
fn test_empty_extraction() {
    assert!(extract("empty.rs", "").is_empty());
}

#[test]
fn test_malformed_source_does_not_fail() {
    let result = extractor().extract_blocking(Grammar::Python, b"def a(:\n  b(\n");
    assert!(result.is_ok());
}

#[test]
fn test_invalid_utf8_handling() {
    let result = extractor().extract_blocking(Grammar::Rust, &[0xFF, 0xFE, 0xFD]);
    assert!(result.unwrap().is_empty());
}

#[tokio::test]
async fn test_async_extract() {
    let units = extractor()
        .extract(Grammar::Python, b"def a():\n    b()\n")
        .await
        .unwrap();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "a");
}
