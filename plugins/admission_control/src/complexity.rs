use graphql_parser::query::{
  Definition, Document, Field, OperationDefinition, Selection, SelectionSet, Text, Value,
};

use crate::{config::CostModelConfig, depth::definition_selection_set};

/// Kind of operation a field belongs to, which drives its base cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
  Query,
  Mutation,
}

impl OperationKind {
  /// Subscriptions and fragment definitions are weighted like queries.
  pub fn of<'a, T: Text<'a>>(definition: &Definition<'a, T>) -> Self {
    match definition {
      Definition::Operation(OperationDefinition::Mutation(_)) => OperationKind::Mutation,
      _ => OperationKind::Query,
    }
  }
}

pub type CostModel = CostModelConfig;

impl CostModel {
  fn base_cost(&self, kind: OperationKind) -> u64 {
    match kind {
      OperationKind::Query => self.query_field_cost,
      OperationKind::Mutation => self.mutation_field_cost,
    }
  }

  fn is_pagination_argument(&self, name: &str) -> bool {
    self.pagination_arguments.iter().any(|arg| arg == name)
  }

  /// Cost of a single field, without its children.
  pub fn field_cost<'a, T: Text<'a>>(&self, field: &Field<'a, T>, kind: OperationKind) -> u64 {
    let mut cost = self.base_cost(kind);

    if !field.selection_set.items.is_empty() {
      cost = cost.saturating_mul(self.default_list_size);
    }

    // An explicit page size is trusted as the real fan-out and replaces the estimate.
    for (name, value) in &field.arguments {
      if let Value::Int(number) = value {
        if self.is_pagination_argument(name.as_ref()) {
          if let Some(page_size) = number.as_i64() {
            cost = page_size.max(0) as u64;
          }
        }
      }
    }

    cost
  }
}

/// Sum of the cost of every field in the document. Costs do not compound along nesting levels.
pub fn query_complexity<'a, T: Text<'a>>(document: &Document<'a, T>, cost_model: &CostModel) -> u64 {
  document
    .definitions
    .iter()
    .map(|definition| {
      selection_set_complexity(
        definition_selection_set(definition),
        OperationKind::of(definition),
        cost_model,
      )
    })
    .fold(0, u64::saturating_add)
}

fn selection_set_complexity<'a, T: Text<'a>>(
  selection_set: &SelectionSet<'a, T>,
  kind: OperationKind,
  cost_model: &CostModel,
) -> u64 {
  selection_set
    .items
    .iter()
    .map(|selection| match selection {
      Selection::Field(field) => cost_model.field_cost(field, kind).saturating_add(
        selection_set_complexity(&field.selection_set, kind, cost_model),
      ),
      Selection::InlineFragment(fragment) => {
        selection_set_complexity(&fragment.selection_set, kind, cost_model)
      }
      Selection::FragmentSpread(_) => 0,
    })
    .fold(0, u64::saturating_add)
}

#[cfg(test)]
mod tests {
  use super::*;
  use gatekeeper_common::graphql::parse_graphql_operation;

  fn complexity(query: &str) -> u64 {
    query_complexity(
      &parse_graphql_operation(query).unwrap(),
      &CostModel::default(),
    )
  }

  #[test]
  fn sibling_leaves_cost_one_each() {
    assert_eq!(complexity("{ a }"), 1);
    assert_eq!(complexity("{ a b c d e }"), 5);
  }

  #[test]
  fn nested_selection_multiplies_by_list_size() {
    assert_eq!(complexity("{ me { id email } }"), 12);
    assert_eq!(complexity("{ books { reviews { user } } }"), 21);
  }

  #[test]
  fn pagination_argument_replaces_the_estimate() {
    assert_eq!(complexity("{ books(first: 3) { id } }"), 4);
    assert_eq!(complexity("{ books(limit: 50) }"), 50);
    assert_eq!(complexity("{ books(first: 100) { reviews { user } } }"), 111);
  }

  #[test]
  fn last_pagination_argument_wins() {
    assert_eq!(complexity("{ books(first: 3, limit: 7) { id } }"), 8);
  }

  #[test]
  fn ignores_non_literal_pagination_arguments() {
    assert_eq!(complexity("query ($n: Int) { books(first: $n) { id } }"), 11);
    assert_eq!(complexity(r#"{ books(first: "3") { id } }"#), 11);
    assert_eq!(complexity("{ books(after: 3) { id } }"), 11);
  }

  #[test]
  fn negative_page_size_costs_nothing() {
    assert_eq!(complexity("{ books(first: -5) { id } }"), 1);
  }

  #[test]
  fn mutation_fields_cost_more() {
    assert_eq!(complexity("mutation { logout }"), 5);
    assert_eq!(
      complexity("mutation { createReview(bookId: 1, rating: 5) { id text } }"),
      60
    );
    assert_eq!(complexity("mutation { importBooks(limit: 2) { id } }"), 7);
  }

  #[test]
  fn mutation_weight_is_scoped_to_its_operation() {
    assert_eq!(complexity("mutation A { logout } query B { me }"), 6);
    assert_eq!(complexity("query B { me } mutation A { logout }"), 6);
  }

  #[test]
  fn counts_fields_in_fragments() {
    assert_eq!(
      complexity("{ me { ...F ... on User { age } } } fragment F on User { name }"),
      10 + 1 + 1
    );
  }

  #[test]
  fn uses_configured_weights() {
    let cost_model = CostModel {
      query_field_cost: 2,
      mutation_field_cost: 3,
      default_list_size: 4,
      pagination_arguments: vec!["pageSize".to_string()],
    };
    let document =
      parse_graphql_operation("{ a { b } c(pageSize: 9) { d } e(first: 1) { f } }").unwrap();

    assert_eq!(query_complexity(&document, &cost_model), 8 + 2 + 9 + 2 + 8 + 2);
  }

  #[test]
  fn is_pure() {
    let document = parse_graphql_operation("{ books(first: 10) { reviews { user } } }").unwrap();
    let cost_model = CostModel::default();

    assert_eq!(
      query_complexity(&document, &cost_model),
      query_complexity(&document, &cost_model)
    );
  }
}
