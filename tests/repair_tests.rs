use savegen::{
    DiagnosticId, Generator, GeneratorConfig, MemberDeclaration, SourceModel, TypeDeclaration,
    TypeKind, fix_all, repair_for,
};

fn broken_model() -> SourceModel {
    SourceModel::new(vec![
        TypeDeclaration::class("Chest")
            .in_namespace(&["loot"])
            .with_member(MemberDeclaration::field("_gold", "u32").saved())
            .with_member(MemberDeclaration::getter("GetLabel", "String").saved()),
        TypeDeclaration::new("Coin", TypeKind::Struct)
            .in_namespace(&["loot"])
            .with_base("Identifiable")
            .with_member(MemberDeclaration::field("value", "u8").saved()),
    ])
}

#[test]
fn test_repairs_in_sequence_reach_a_clean_generation() {
    let generator = Generator::new(GeneratorConfig::new()).unwrap();
    let config = generator.config().clone();
    let mut model = broken_model();

    let order = [
        DiagnosticId::MustBeInsideAClass,
        DiagnosticId::MustImplementIdentifiable,
        DiagnosticId::ClassMustBeExtensible,
        DiagnosticId::MustCallRegistrationEntryPoint,
    ];
    for id in order {
        let output = generator.run(&model);
        model = fix_all(&model, &output.diagnostics, id, &config).unwrap();
        assert_eq!(generator.run(&model).diagnostics_of(id).count(), 0, "{id} not fixed");
    }

    let output = generator.run(&model);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(
        output.procedure("loot::Chest").unwrap().ids().collect::<Vec<_>>(),
        vec!["gold", "label"]
    );
    assert_eq!(
        output.procedure("loot::Coin").unwrap().ids().collect::<Vec<_>>(),
        vec!["value"]
    );
}

#[test]
fn test_repair_scripts_serialize_for_hosts() {
    let generator = Generator::new(GeneratorConfig::new()).unwrap();
    let model = broken_model();
    let output = generator.run(&model);

    let scripts: Vec<_> = output
        .diagnostics
        .iter()
        .filter_map(|diagnostic| repair_for(diagnostic, &model, generator.config()))
        .collect();
    assert!(!scripts.is_empty());

    let json = serde_json::to_string(&scripts).unwrap();
    let decoded: Vec<savegen::EditScript> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, scripts);
}
