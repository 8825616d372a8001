use graphql_parser::query::{Definition, Document, OperationDefinition, Selection, SelectionSet, Text};

pub(crate) fn definition_selection_set<'d, 'a, T: Text<'a>>(
  definition: &'d Definition<'a, T>,
) -> &'d SelectionSet<'a, T> {
  match definition {
    Definition::Operation(OperationDefinition::SelectionSet(selection_set)) => selection_set,
    Definition::Operation(OperationDefinition::Query(query)) => &query.selection_set,
    Definition::Operation(OperationDefinition::Mutation(mutation)) => &mutation.selection_set,
    Definition::Operation(OperationDefinition::Subscription(subscription)) => {
      &subscription.selection_set
    }
    Definition::Fragment(fragment) => &fragment.selection_set,
  }
}

/// Maximum nesting depth of field selections across every definition of the document.
///
/// Depth counts field levels: `{ user }` has depth 1, `{ user { profile { avatar } } }` has depth 3.
/// Inline fragments do not add a level, and fragment spreads are not expanded (fragment
/// definitions are measured on their own).
pub fn query_depth<'a, T: Text<'a>>(document: &Document<'a, T>) -> usize {
  document
    .definitions
    .iter()
    .map(|definition| selection_set_depth(definition_selection_set(definition), 0))
    .max()
    .unwrap_or(0)
}

fn selection_set_depth<'a, T: Text<'a>>(selection_set: &SelectionSet<'a, T>, level: usize) -> usize {
  selection_set
    .items
    .iter()
    .map(|selection| match selection {
      Selection::Field(field) => selection_set_depth(&field.selection_set, level + 1),
      Selection::InlineFragment(fragment) => selection_set_depth(&fragment.selection_set, level),
      Selection::FragmentSpread(_) => level,
    })
    .max()
    .unwrap_or(level)
}

#[cfg(test)]
mod tests {
  use super::*;
  use gatekeeper_common::graphql::parse_graphql_operation;

  fn depth(query: &str) -> usize {
    query_depth(&parse_graphql_operation(query).unwrap())
  }

  #[test]
  fn single_field_has_depth_one() {
    assert_eq!(depth("{ me }"), 1);
    assert_eq!(depth("{ a b c }"), 1);
  }

  #[test]
  fn counts_field_levels() {
    assert_eq!(depth("{ user { profile { avatar } } }"), 3);
  }

  #[test]
  fn uniform_nesting_matches_level_count() {
    for levels in 1..=12 {
      // { f { f { f } } }
      let nested = (1..levels).fold("f".to_string(), |inner, _| format!("f {{ {} }}", inner));
      let query = format!("{{ {} }}", nested);

      assert_eq!(depth(&query), levels, "{}", query);
    }
  }

  #[test]
  fn takes_the_deepest_branch() {
    assert_eq!(depth("{ a { b } c { d { e { f } } } g }"), 4);
  }

  #[test]
  fn inline_fragments_do_not_add_levels() {
    assert_eq!(depth("{ node { ... on User { name { first } } } }"), 3);
  }

  #[test]
  fn fragment_definitions_are_measured_separately() {
    let query = r#"
      query { me { ...Friends } }
      fragment Friends on User { friends { friends { friends { id } } } }
    "#;

    assert_eq!(depth(query), 4);
  }

  #[test]
  fn considers_every_operation() {
    assert_eq!(depth("query A { a } mutation B { b { c } }"), 2);
  }

  #[test]
  fn is_pure() {
    let document = parse_graphql_operation("{ user { profile { avatar } } }").unwrap();
    assert_eq!(query_depth(&document), query_depth(&document));
  }
}
