//! Bundle output: one IIFE holding every module function and a small
//! module runtime. Module 0 is the entry and runs when the bundle loads.

/// A rendered module body and the name it is listed under.
#[derive(Debug, Clone)]
pub struct LinkedModule {
    pub name: String,
    pub body: String,
}

const RUNTIME: &str = r#"  var __cache = [];
  function __require(id) {
    var cached = __cache[id];
    if (cached) return cached;
    var exports = {};
    __cache[id] = exports;
    __defs[id](exports, __require, __import);
    return exports;
  }
  function __import(id) {
    return Promise.resolve().then(function () { return __require(id); });
  }
  function __export(target, getters) {
    for (var name in getters) Object.defineProperty(target, name, { get: getters[name], enumerable: true });
  }
  function __reexport(target, source) {
    Object.keys(source).forEach(function (name) {
      if (name === "default" || Object.prototype.hasOwnProperty.call(target, name)) return;
      Object.defineProperty(target, name, { get: function () { return source[name]; }, enumerable: true });
    });
  }
"#;

/// Wrap `modules` (entry first) into a self-executing bundle.
#[must_use]
pub fn render_bundle(modules: &[LinkedModule], target: &str) -> String {
    let size: usize = modules.iter().map(|m| m.body.len() + m.name.len() + 64).sum();
    let mut out = String::with_capacity(size + RUNTIME.len() + 128);
    out.push_str(&format!("// target: {target}\n(function () {{\n  \"use strict\";\n  var __defs = [\n"));
    for module in modules {
        let name = module.name.replace(['\n', '\r'], " ");
        out.push_str(&format!("  // {name}\n  function (__exports, __require, __import) {{ {}\n  }},\n", module.body));
    }
    out.push_str("  ];\n");
    out.push_str(RUNTIME);
    if !modules.is_empty() {
        out.push_str("  __require(0);\n");
    }
    out.push_str("})();\n");
    out
}

#[cfg(test)]
#[path = "bundle_test.rs"]
mod tests;
