#![allow(dead_code)]

use criterion::{criterion_group, criterion_main, Criterion};
use ductile::{annotate, Callable, Injector, Module};
use std::sync::Arc;

struct A(Arc<B>, Arc<C>);
struct B(i32);
struct C(Arc<CA>);
struct CA(Arc<CAA>);
struct CAA(Arc<CAAA>);
struct CAAA;

#[inline]
fn chain_module() -> Module {
    Module::builder()
        .factory("caaa", Callable::new(|| Ok(CAAA)))
        .factory("caa", annotate(["caaa"], |caaa: Arc<CAAA>| Ok(CAA(caaa))))
        .factory("ca", annotate(["caa"], |caa: Arc<CAA>| Ok(CA(caa))))
        .factory("c", annotate(["ca"], |ca: Arc<CA>| Ok(C(ca))).scope(["request"]))
        .value("b", B(2))
        .factory("a", annotate(["b", "c"], |b: Arc<B>, c: Arc<C>| Ok(A(b, c))).scope(["request"]))
        .build()
}

#[inline]
fn private_module() -> Module {
    Module::builder()
        .value("secret", 1_i32)
        .factory("public", annotate(["secret"], |secret: Arc<i32>| Ok(*secret + 1)))
        .exports(["public"])
        .build()
}

#[inline]
fn injector_new(module: &Module, private: &Module) -> Injector {
    Injector::new([module.clone(), private.clone()])
}

#[inline]
fn injector_get(injector: &Injector) {
    let _ = injector.get("a").unwrap();
}

#[inline]
fn injector_child_forced(injector: &Injector) {
    let child = injector.create_child([], &["request", "public"]).unwrap();
    let _ = child.get("a").unwrap();
    let _ = child.get("public").unwrap();
}

fn criterion_benchmark(c: &mut Criterion) {
    let (module, private) = (chain_module(), private_module());
    let cached = injector_new(&module, &private);
    injector_get(&cached);

    c.bench_function("injector_new", |b| b.iter(|| injector_new(&module, &private)))
        .bench_function("injector_get", |b| {
            b.iter(|| injector_get(&injector_new(&module, &private)))
        })
        .bench_function("injector_get_with_cache", |b| b.iter(|| injector_get(&cached)))
        .bench_function("injector_child_forced", |b| b.iter(|| injector_child_forced(&cached)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
